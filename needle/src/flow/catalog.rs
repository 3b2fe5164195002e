//! The built-in flows.

use super::validators::{
    DateInput, ExistingEntryDate, Hashtag, Link, NonEmptyText, PhotoInput, PositiveDecimal,
    PositiveInteger,
};
use super::{Choice, FinishContext, FlowDefinition, FlowType, InputKind, PromptHint, StepDefinition};
use crate::error::FinishError;
use crate::record::{
    EntryRemoval, Note, Plan, ProgressEntry, Project, ProjectPhoto, Record, WishlistItem,
};
use crate::util::generate_id;
use crate::value::{FieldValue, Fields};

/// Seed field of [`FlowType::ReplaceProjectPhoto`].
pub const PROJECT_ID: &str = "project_id";

const NAME_REQUIRED: &str = "Название не может быть пустым";

/// All built-in definitions.
pub(super) fn standard() -> Vec<FlowDefinition> {
    vec![
        add_entry(),
        add_project(),
        delete_entry(),
        add_wishlist_item(),
        add_note(),
        add_plan(),
        replace_project_photo(),
    ]
}

fn add_entry() -> FlowDefinition {
    const BAD_DATE: &str = "Неверный формат даты. Используйте ДД.ММ.ГГГГ или нажмите кнопку «📅 Сегодня»";

    FlowDefinition::new(FlowType::AddEntry, "📝 **Добавление крестиков**", finish_entry)
        .step(
            StepDefinition::new(
                "date",
                InputKind::Date,
                "Введите дату в формате ДД.ММ.ГГГГ или нажмите кнопку:",
                DateInput::new(BAD_DATE).with_year_bounds(1900, 1),
            )
            .choice(Choice::new("📅 Сегодня", "entry_date_today", "сегодня"))
            .choice(Choice::new("📅 Вчера", "entry_date_yesterday", "вчера"))
            .hint(PromptHint::KnownHashtags),
        )
        .step(StepDefinition::new(
            "count",
            InputKind::Number,
            "✅ Дата: {date}\n\nВведите количество крестиков (можно с половинкой, например: 254.5):",
            PositiveDecimal,
        ))
        .step(
            StepDefinition::new(
                "hashtag",
                InputKind::Text,
                "✅ Количество: {count} крестиков\n\nОтправьте хэштег (например: #работа1) или нажмите «Пропустить»",
                Hashtag::lowercase(),
            )
            .skippable("entry_hashtag_skip")
            .hint(PromptHint::KnownHashtags),
        )
        .notify_hooks()
}

fn finish_entry(fields: &Fields, _ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::Entry(ProgressEntry {
        id: generate_id("entry"),
        date: fields.date("date")?,
        count: fields.number("count")?,
        hashtag: fields.opt_text("hashtag")?.map(String::from),
    }))
}

fn add_project() -> FlowDefinition {
    FlowDefinition::new(FlowType::AddProject, "📝 **Добавление новой работы**", finish_project)
        .step(StepDefinition::new(
            "name",
            InputKind::Text,
            "Введите название работы:",
            NonEmptyText::new(NAME_REQUIRED),
        ))
        .step(
            StepDefinition::new(
                "photo",
                InputKind::Photo,
                "✅ Название: {name}\n\nОтправьте фото работы (или «пропустить»):",
                PhotoInput,
            )
            .skippable("project_photo_skip"),
        )
        .step(
            StepDefinition::new(
                "hashtag",
                InputKind::Text,
                "Введите хэштег для этой работы (или «пропустить»):",
                Hashtag::verbatim(),
            )
            .skippable("project_hashtag_skip"),
        )
}

fn finish_project(fields: &Fields, _ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::Project(Project {
        id: generate_id("project"),
        name: fields.text("name")?.to_string(),
        photo: fields.opt_photo("photo")?.cloned(),
        hashtag: fields.opt_text("hashtag")?.map(String::from),
    }))
}

fn delete_entry() -> FlowDefinition {
    const BAD_DATE: &str = "Неверный формат даты. Используйте ДД.ММ.ГГГГ или «сегодня»";

    FlowDefinition::new(FlowType::DeleteEntry, "📅 **Удаление записи за день**", finish_removal)
        .step(
            StepDefinition::new(
                "date",
                InputKind::Date,
                "Введите дату в формате ДД.ММ.ГГГГ (или «сегодня»):",
                ExistingEntryDate::new(DateInput::new(BAD_DATE)),
            )
            .choice(Choice::new("📅 Сегодня", "delete_date_today", "сегодня")),
        )
}

fn finish_removal(fields: &Fields, _ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::EntryRemoval(EntryRemoval {
        date: fields.date("date")?,
    }))
}

fn add_wishlist_item() -> FlowDefinition {
    FlowDefinition::new(FlowType::AddWishlistItem, "📝 **Добавление в вишлист**", finish_wishlist)
        .step(StepDefinition::new(
            "name",
            InputKind::Text,
            "Введите название работы:",
            NonEmptyText::new(NAME_REQUIRED),
        ))
        .step(
            StepDefinition::new(
                "link",
                InputKind::Text,
                "✅ Название: {name}\n\n🔗 Отправьте ссылку на товар или «пропустить»",
                Link,
            )
            .skippable("wishlist_link_skip"),
        )
}

fn finish_wishlist(fields: &Fields, ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::WishlistItem(WishlistItem {
        id: generate_id("wishlist"),
        name: fields.text("name")?.to_string(),
        link: fields.opt_text("link")?.map(String::from),
        created_on: ctx.now.date(),
        completed: false,
    }))
}

fn add_note() -> FlowDefinition {
    FlowDefinition::new(FlowType::AddNote, "📝 **Добавление заметки**", finish_note)
        .step(StepDefinition::new(
            "title",
            InputKind::Text,
            "Введите название заметки:",
            NonEmptyText::new(NAME_REQUIRED),
        ))
        .step(StepDefinition::new(
            "text",
            InputKind::Text,
            "✅ Название: {title}\n\n✍️ Введите текст заметки:",
            NonEmptyText::new("Текст не может быть пустым"),
        ))
}

fn finish_note(fields: &Fields, ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::Note(Note {
        id: generate_id("note"),
        title: fields.text("title")?.to_string(),
        text: fields.text("text")?.to_string(),
        created_at: ctx.now,
    }))
}

fn add_plan() -> FlowDefinition {
    FlowDefinition::new(FlowType::AddPlan, "📋 **Создание плана**", finish_plan)
        .step(StepDefinition::new(
            "name",
            InputKind::Text,
            "Введите название плана:",
            NonEmptyText::new(NAME_REQUIRED),
        ))
        .step(StepDefinition::new(
            "target",
            InputKind::Number,
            "✅ Название: {name}\n\nВведите целевое количество крестиков:",
            PositiveInteger,
        ))
        .step(
            StepDefinition::new(
                "hashtag",
                InputKind::Text,
                "✅ Цель: {target} крестиков\n\nВведите хэштег для отслеживания (или «пропустить»):",
                Hashtag::lowercase(),
            )
            .skippable("plan_hashtag_skip")
            .hint(PromptHint::KnownHashtags),
        )
        .step(
            StepDefinition::new(
                "target_date",
                InputKind::Date,
                "Введите дату цели (ДД.ММ.ГГГГ) или «пропустить»:",
                DateInput::new("Неверный формат даты. Используйте ДД.ММ.ГГГГ или «пропустить»"),
            )
            .skippable("plan_target_date_skip"),
        )
}

fn finish_plan(fields: &Fields, ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::Plan(Plan {
        id: generate_id("plan"),
        name: fields.text("name")?.to_string(),
        target_count: fields.integer("target")?,
        hashtag: fields.opt_text("hashtag")?.map(String::from),
        target_date: fields.opt_date("target_date")?,
        created_on: ctx.now.date(),
    }))
}

fn replace_project_photo() -> FlowDefinition {
    FlowDefinition::new(
        FlowType::ReplaceProjectPhoto,
        "📸 **Замена фото**",
        finish_project_photo,
    )
    .seed(PROJECT_ID)
    .step(StepDefinition::new(
        "photo",
        InputKind::Photo,
        "Отправьте новое фото для этой работы:",
        PhotoInput,
    ))
}

fn finish_project_photo(fields: &Fields, _ctx: &FinishContext) -> Result<Record, FinishError> {
    Ok(Record::ProjectPhoto(ProjectPhoto {
        project_id: fields.text(PROJECT_ID)?.to_string(),
        photo: fields.photo("photo")?.clone(),
    }))
}

/// Seed fields for [`FlowType::ReplaceProjectPhoto`].
#[must_use]
pub fn project_photo_seed(project_id: impl Into<String>) -> Fields {
    Fields::new().with(PROJECT_ID, FieldValue::Text(project_id.into()))
}
