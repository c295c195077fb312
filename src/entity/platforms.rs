use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "platforms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_platforms::Entity")]
    ProductPlatforms,
    #[sea_orm(has_many = "super::inventory::Entity")]
    Inventory,
}

impl Related<super::product_platforms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductPlatforms.def()
    }
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        super::product_platforms::Relation::Products.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::product_platforms::Relation::Platforms.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
