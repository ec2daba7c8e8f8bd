use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const FK_TASKS_TO_PROJECTS: &str = "fk-tasks-project_id";
const FK_TASKS_TO_USERS: &str = "fk-tasks-creator_id";
const IDX_TASKS_PROJECT_CREATED: &str = "idx-tasks-project_id-created_at";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_uuid(Tasks::Id))
                    .col(uuid(Tasks::ProjectId))
                    .col(uuid(Tasks::CreatorId))
                    .col(string(Tasks::Title))
                    .col(text_null(Tasks::Description))
                    .col(timestamp_with_time_zone_null(Tasks::StartsAt))
                    .col(timestamp_with_time_zone_null(Tasks::EndsAt))
                    .col(timestamp_with_time_zone(Tasks::CreatedAt))
                    .col(timestamp_with_time_zone(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_PROJECTS)
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_USERS)
                            .from(Tasks::Table, Tasks::CreatorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        // Listing filters by project and sorts by creation time.
        manager
            .create_index(
                Index::create()
                    .name(IDX_TASKS_PROJECT_CREATED)
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .col(Tasks::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASKS_PROJECT_CREATED)
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    ProjectId,
    CreatorId,
    Title,
    Description,
    StartsAt,
    EndsAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
