use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "hire_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub details: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub hire_price_per_hour: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub hire_price_per_day: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
