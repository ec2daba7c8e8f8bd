use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const IDX_TASK_PARTICIPANTS_POSITION: &str = "idx-task_participants-task_id-position";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Two links of one task never share a position.
        manager
            .create_index(
                Index::create()
                    .name(IDX_TASK_PARTICIPANTS_POSITION)
                    .table(TaskParticipants::Table)
                    .col(TaskParticipants::TaskId)
                    .col(TaskParticipants::Position)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASK_PARTICIPANTS_POSITION)
                    .table(TaskParticipants::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum TaskParticipants {
    Table,
    TaskId,
    Position,
}
