//! Step validators.
//!
//! A validator turns the raw answer to a step into a typed [`FieldValue`], or
//! rejects it with a short hint. Validators may consult the owner's stored
//! records (e.g. "is there an entry on this date?").

use crate::OwnerId;
use crate::error::ValidationError;
use crate::format::format_date_short;
use crate::record::{Record, RecordKind};
use crate::store::RecordStore;
use crate::value::{FieldValue, Fields, PhotoRef};
use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate};
use tracing::warn;

/// Raw answer handed to a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    /// Typed text, or the text equivalent of a pressed choice button.
    Text(String),
    /// A photo.
    Photo(PhotoRef),
}

/// What a validator may look at besides the input.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Owner answering.
    pub owner: OwnerId,
    /// Current local date.
    pub today: NaiveDate,
    /// The owner's stored records.
    pub records: &'a dyn RecordStore,
    /// Fields collected so far.
    pub fields: &'a Fields,
}

impl std::fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("owner", &self.owner)
            .field("today", &self.today)
            .finish_non_exhaustive()
    }
}

/// Validates the answer to one step.
#[async_trait]
pub trait StepValidator: Send + Sync {
    /// Produce the value to store, or a hint explaining the rejection.
    async fn validate(
        &self,
        input: &StepInput,
        ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError>;
}

fn expect_text<'a>(input: &'a StepInput, hint: &str) -> Result<&'a str, ValidationError> {
    match input {
        StepInput::Text(text) => Ok(text.trim()),
        StepInput::Photo(_) => Err(ValidationError::new(hint)),
    }
}

// ============================================================================
// Text
// ============================================================================

/// Any non-blank text, trimmed.
#[derive(Debug, Clone)]
pub struct NonEmptyText {
    hint: String,
}

impl NonEmptyText {
    /// Reject blank input with `hint`.
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }
}

#[async_trait]
impl StepValidator for NonEmptyText {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        let text = expect_text(input, &self.hint)?;
        if text.is_empty() {
            return Err(ValidationError::new(&self.hint));
        }
        Ok(FieldValue::Text(text.to_string()))
    }
}

/// A hashtag: leading `#` stripped, optionally lower-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hashtag {
    lowercase: bool,
}

impl Hashtag {
    /// Keep the hashtag's case.
    #[must_use]
    pub const fn verbatim() -> Self {
        Self { lowercase: false }
    }

    /// Store the hashtag lower-cased.
    #[must_use]
    pub const fn lowercase() -> Self {
        Self { lowercase: true }
    }
}

#[async_trait]
impl StepValidator for Hashtag {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        const HINT: &str = "Хэштег не может быть пустым. Нажмите «Пропустить», если он не нужен.";
        let text = expect_text(input, HINT)?;
        let tag = text.trim_start_matches('#').trim();
        if tag.is_empty() {
            return Err(ValidationError::new(HINT));
        }
        let tag = if self.lowercase {
            tag.to_lowercase()
        } else {
            tag.to_string()
        };
        Ok(FieldValue::Text(tag))
    }
}

/// A shop link. Bare domains get an `https://` scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct Link;

impl Link {
    /// Normalize a link, or `None` when it does not look like one.
    #[must_use]
    pub fn normalize(text: &str) -> Option<String> {
        let text = text.trim();
        let lower = text.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Some(text.to_string())
        } else if text.contains('.') && !text.contains(char::is_whitespace) {
            Some(format!("https://{text}"))
        } else {
            None
        }
    }
}

#[async_trait]
impl StepValidator for Link {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        const HINT: &str =
            "Неверный формат ссылки.\n\nОтправьте ссылку (например: https://ozon.ru/...) или «пропустить»";
        let text = expect_text(input, HINT)?;
        Self::normalize(text)
            .map(FieldValue::Text)
            .ok_or_else(|| ValidationError::new(HINT))
    }
}

// ============================================================================
// Numbers
// ============================================================================

/// A positive decimal; a comma is accepted as decimal separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositiveDecimal;

#[async_trait]
impl StepValidator for PositiveDecimal {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        const NOT_A_NUMBER: &str = "Введите число";
        const NOT_POSITIVE: &str = "Введите положительное число (можно с половинкой, например: 254.5)";
        let text = expect_text(input, NOT_A_NUMBER)?;
        let value: f64 = text
            .replace(',', ".")
            .parse()
            .map_err(|_| ValidationError::new(NOT_A_NUMBER))?;
        if !value.is_finite() {
            return Err(ValidationError::new(NOT_A_NUMBER));
        }
        if value <= 0.0 {
            return Err(ValidationError::new(NOT_POSITIVE));
        }
        Ok(FieldValue::Number(value))
    }
}

/// A positive whole number.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositiveInteger;

#[async_trait]
impl StepValidator for PositiveInteger {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        const NOT_A_NUMBER: &str = "Введите целое число";
        let text = expect_text(input, NOT_A_NUMBER)?;
        let value: i64 = text
            .parse()
            .map_err(|_| ValidationError::new(NOT_A_NUMBER))?;
        if value <= 0 {
            return Err(ValidationError::new("Введите положительное число"));
        }
        Ok(FieldValue::Integer(value))
    }
}

// ============================================================================
// Dates
// ============================================================================

/// Parse a date answer relative to `today`.
///
/// Accepts `сегодня`/`today`, `вчера`/`yesterday`, `DD.MM.YYYY`, `DD.MM.YY`,
/// `DD/MM/YYYY`, `DD-MM-YYYY` and `YYYY-MM-DD`.
#[must_use]
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim().to_lowercase();
    match text.as_str() {
        "сегодня" | "today" => return Some(today),
        "вчера" | "yesterday" => return today.checked_sub_days(Days::new(1)),
        _ => {}
    }

    if let Some([y, m, d]) = split3(&text, '-')
        && y.len() == 4
    {
        return ymd(y, m, d);
    }
    for sep in ['.', '/', '-'] {
        if let Some([d, m, y]) = split3(&text, sep) {
            return match y.len() {
                4 => ymd(y, m, d),
                2 => ymd(&format!("20{y}"), m, d),
                _ => None,
            };
        }
    }
    None
}

fn split3(text: &str, sep: char) -> Option<[&str; 3]> {
    let mut parts = text.split(sep);
    let parts = [parts.next()?, parts.next()?, parts.next()?];
    let all_digits = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    (all_digits && text.matches(sep).count() == 2).then_some(parts)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// A date typed as text or picked with a button.
#[derive(Debug, Clone)]
pub struct DateInput {
    hint: String,
    min_year: Option<i32>,
    years_ahead: Option<i32>,
}

impl DateInput {
    /// Accept any parseable date.
    pub fn new(hint: impl Into<String>) -> Self {
        Self {
            hint: hint.into(),
            min_year: None,
            years_ahead: None,
        }
    }

    /// Restrict the year to `min_year..=current_year + years_ahead`.
    #[must_use]
    pub const fn with_year_bounds(mut self, min_year: i32, years_ahead: i32) -> Self {
        self.min_year = Some(min_year);
        self.years_ahead = Some(years_ahead);
        self
    }

    /// Parse and bounds-check `text`.
    pub fn check(&self, text: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
        let date = parse_date(text, today).ok_or_else(|| ValidationError::new(&self.hint))?;
        if let (Some(min), Some(ahead)) = (self.min_year, self.years_ahead) {
            let max = today.year() + ahead;
            if !(min..=max).contains(&date.year()) {
                return Err(ValidationError::new(format!(
                    "Некорректная дата. Год должен быть от {min} до {max}.\n\n{}",
                    self.hint
                )));
            }
        }
        Ok(date)
    }
}

#[async_trait]
impl StepValidator for DateInput {
    async fn validate(
        &self,
        input: &StepInput,
        ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        let text = expect_text(input, &self.hint)?;
        self.check(text, ctx.today).map(FieldValue::Date)
    }
}

/// A date on which the owner has at least one stored entry.
#[derive(Debug, Clone)]
pub struct ExistingEntryDate {
    date: DateInput,
}

impl ExistingEntryDate {
    /// Wrap a date validator.
    #[must_use]
    pub const fn new(date: DateInput) -> Self {
        Self { date }
    }
}

#[async_trait]
impl StepValidator for ExistingEntryDate {
    async fn validate(
        &self,
        input: &StepInput,
        ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        let text = expect_text(input, &self.date.hint)?;
        let date = self.date.check(text, ctx.today)?;
        let entries = ctx
            .records
            .list(ctx.owner, RecordKind::Entry)
            .await
            .map_err(|e| {
                warn!(owner = %ctx.owner, error = %e, "failed to list entries");
                ValidationError::new("Не удалось проверить записи. Попробуйте еще раз.")
            })?;
        let found = entries
            .iter()
            .any(|r| matches!(r, Record::Entry(e) if e.date == date));
        if !found {
            return Err(ValidationError::new(format!(
                "Нет записи за {}",
                format_date_short(date)
            )));
        }
        Ok(FieldValue::Date(date))
    }
}

// ============================================================================
// Media
// ============================================================================

/// A photo.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoInput;

#[async_trait]
impl StepValidator for PhotoInput {
    async fn validate(
        &self,
        input: &StepInput,
        _ctx: &StepContext<'_>,
    ) -> Result<FieldValue, ValidationError> {
        match input {
            StepInput::Photo(photo) => Ok(FieldValue::Photo(photo.clone())),
            StepInput::Text(_) => Err(ValidationError::new("Отправьте фото")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProgressEntry;
    use crate::store::MemoryRecordStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> StepInput {
        StepInput::Text(s.to_string())
    }

    async fn run(
        validator: &dyn StepValidator,
        input: StepInput,
        records: &MemoryRecordStore,
    ) -> Result<FieldValue, ValidationError> {
        let fields = Fields::new();
        let ctx = StepContext {
            owner: 7,
            today: date(2025, 3, 10),
            records,
            fields: &fields,
        };
        validator.validate(&input, &ctx).await
    }

    #[test]
    fn test_parse_date_formats() {
        let today = date(2025, 3, 10);
        assert_eq!(parse_date("Сегодня", today), Some(today));
        assert_eq!(parse_date("yesterday", today), Some(date(2025, 3, 9)));
        assert_eq!(parse_date("05.03.2024", today), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("5.3.24", today), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024", today), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("05-03-2024", today), Some(date(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05", today), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        let today = date(2025, 3, 10);
        for bad in ["", "завтра", "31.02.2024", "1.2.3.4", "05.03.202", "a.b.c", "5..2024"] {
            assert_eq!(parse_date(bad, today), None, "{bad}");
        }
    }

    #[tokio::test]
    async fn test_date_year_bounds() {
        let store = MemoryRecordStore::new();
        let validator = DateInput::new("bad date").with_year_bounds(1900, 1);

        assert!(run(&validator, text("01.01.2026"), &store).await.is_ok());
        let err = run(&validator, text("01.01.2027"), &store).await.unwrap_err();
        assert!(err.hint().contains("от 1900 до 2026"));
        assert!(run(&validator, text("01.01.1899"), &store).await.is_err());
    }

    #[tokio::test]
    async fn test_positive_decimal() {
        let store = MemoryRecordStore::new();
        assert_eq!(
            run(&PositiveDecimal, text("254,5"), &store).await.unwrap(),
            FieldValue::Number(254.5)
        );
        assert_eq!(
            run(&PositiveDecimal, text("abc"), &store).await.unwrap_err().hint(),
            "Введите число"
        );
        assert!(
            run(&PositiveDecimal, text("-5"), &store)
                .await
                .unwrap_err()
                .hint()
                .contains("положительное")
        );
        assert!(run(&PositiveDecimal, text("0"), &store).await.is_err());
        assert!(run(&PositiveDecimal, text("inf"), &store).await.is_err());
    }

    #[tokio::test]
    async fn test_positive_integer() {
        let store = MemoryRecordStore::new();
        assert_eq!(
            run(&PositiveInteger, text("5000"), &store).await.unwrap(),
            FieldValue::Integer(5000)
        );
        assert!(run(&PositiveInteger, text("12.5"), &store).await.is_err());
        assert!(run(&PositiveInteger, text("0"), &store).await.is_err());
    }

    #[tokio::test]
    async fn test_hashtag() {
        let store = MemoryRecordStore::new();
        assert_eq!(
            run(&Hashtag::lowercase(), text(" #Fox "), &store).await.unwrap(),
            FieldValue::Text("fox".into())
        );
        assert_eq!(
            run(&Hashtag::verbatim(), text("#Fox"), &store).await.unwrap(),
            FieldValue::Text("Fox".into())
        );
        assert!(run(&Hashtag::lowercase(), text("#"), &store).await.is_err());
    }

    #[test]
    fn test_link_normalization() {
        assert_eq!(
            Link::normalize("https://ozon.ru/x").as_deref(),
            Some("https://ozon.ru/x")
        );
        assert_eq!(
            Link::normalize("www.ozon.ru").as_deref(),
            Some("https://www.ozon.ru")
        );
        assert_eq!(
            Link::normalize("ozon.ru/item").as_deref(),
            Some("https://ozon.ru/item")
        );
        assert_eq!(Link::normalize("магазин у дома"), None);
    }

    #[tokio::test]
    async fn test_existing_entry_date() {
        let store = MemoryRecordStore::new();
        store
            .save(
                7,
                Record::Entry(ProgressEntry {
                    id: "entry-1".into(),
                    date: date(2025, 3, 10),
                    count: 10.0,
                    hashtag: None,
                }),
            )
            .await
            .unwrap();
        let validator = ExistingEntryDate::new(DateInput::new("bad date"));

        assert_eq!(
            run(&validator, text("сегодня"), &store).await.unwrap(),
            FieldValue::Date(date(2025, 3, 10))
        );
        let err = run(&validator, text("вчера"), &store).await.unwrap_err();
        assert_eq!(err.hint(), "Нет записи за 09.03.2025");
    }

    #[tokio::test]
    async fn test_photo_input() {
        let store = MemoryRecordStore::new();
        let photo = StepInput::Photo(PhotoRef::new("file-1"));
        assert!(matches!(
            run(&PhotoInput, photo, &store).await.unwrap(),
            FieldValue::Photo(_)
        ));
        assert!(run(&PhotoInput, text("фото"), &store).await.is_err());
    }
}
