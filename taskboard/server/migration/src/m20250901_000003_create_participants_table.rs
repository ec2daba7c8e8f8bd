use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const FK_PARTICIPANTS_TO_PROJECTS: &str = "fk-participants-project_id";
const FK_PARTICIPANTS_TO_USERS: &str = "fk-participants-user_id";
const IDX_PARTICIPANTS_PROJECT_USER: &str = "idx-participants-project_id-user_id";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Participants::Table)
                    .if_not_exists()
                    .col(pk_uuid(Participants::Id))
                    .col(uuid(Participants::ProjectId))
                    .col(uuid(Participants::UserId))
                    .col(boolean(Participants::Active).default(true))
                    .col(timestamp_with_time_zone(Participants::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_PARTICIPANTS_TO_PROJECTS)
                            .from(Participants::Table, Participants::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_PARTICIPANTS_TO_USERS)
                            .from(Participants::Table, Participants::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_PARTICIPANTS_PROJECT_USER)
                    .table(Participants::Table)
                    .col(Participants::ProjectId)
                    .col(Participants::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_PARTICIPANTS_PROJECT_USER)
                    .table(Participants::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Participants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Participants {
    Table,
    Id,
    ProjectId,
    UserId,
    Active,
    CreatedAt,
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
