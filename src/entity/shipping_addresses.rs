use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "shipping_addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub guest_user_id: Option<String>,
    pub delivery_method: String,
    pub selected_store_id: Option<String>,
    pub collector_name: Option<String>,
    pub collector_phone: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::guest_users::Entity",
        from = "Column::GuestUserId",
        to = "super::guest_users::Column::Id"
    )]
    GuestUsers,
}

impl Related<super::guest_users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GuestUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
