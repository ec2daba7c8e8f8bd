use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const PK_TASK_PARTICIPANTS: &str = "pk-task_participants";
const FK_TASK_PARTICIPANTS_TO_TASKS: &str = "fk-task_participants-task_id";
const FK_TASK_PARTICIPANTS_TO_PARTICIPANTS: &str = "fk-task_participants-participant_id";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TaskParticipants::Table)
                    .if_not_exists()
                    .col(uuid(TaskParticipants::TaskId))
                    .col(uuid(TaskParticipants::ParticipantId))
                    .col(integer(TaskParticipants::Position))
                    // The composite key keeps a participant from being linked twice.
                    .primary_key(
                        Index::create()
                            .name(PK_TASK_PARTICIPANTS)
                            .table(TaskParticipants::Table)
                            .col(TaskParticipants::TaskId)
                            .col(TaskParticipants::ParticipantId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASK_PARTICIPANTS_TO_TASKS)
                            .from(TaskParticipants::Table, TaskParticipants::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASK_PARTICIPANTS_TO_PARTICIPANTS)
                            .from(TaskParticipants::Table, TaskParticipants::ParticipantId)
                            .to(Participants::Table, Participants::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskParticipants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TaskParticipants {
    Table,
    TaskId,
    ParticipantId,
    Position,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Participants {
    Table,
    Id,
}
