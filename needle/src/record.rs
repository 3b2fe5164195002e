//! Records committed by completed dialogs.

use crate::format::{format_date_long, format_number};
use crate::value::PhotoRef;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a committed record, used to address the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A progress entry (count made on a date).
    Entry,
    /// A project.
    Project,
    /// Removal of all entries on a date.
    EntryRemoval,
    /// A wishlist item.
    WishlistItem,
    /// A free-form note.
    Note,
    /// A plan with a target count.
    Plan,
    /// Replacement of a project's photo.
    ProjectPhoto,
}

impl RecordKind {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Project => "project",
            Self::EntryRemoval => "entry_removal",
            Self::WishlistItem => "wishlist_item",
            Self::Note => "note",
            Self::Plan => "plan",
            Self::ProjectPhoto => "project_photo",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count made on a date, optionally tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    /// Unique id.
    pub id: String,
    /// Day the work was done.
    pub date: NaiveDate,
    /// Amount of work (stitches).
    pub count: f64,
    /// Lower-cased hashtag without `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
}

/// A project the owner is working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Cover photo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoRef>,
    /// Hashtag without `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
}

/// Request to delete every entry on `date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRemoval {
    /// Day to clear.
    pub date: NaiveDate,
}

/// Something the owner would like to buy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    /// Unique id.
    pub id: String,
    /// What to buy.
    pub name: String,
    /// Shop link, always with a scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Creation day.
    pub created_on: NaiveDate,
    /// Whether the item was bought.
    #[serde(default)]
    pub completed: bool,
}

/// A titled free-form note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Body.
    pub text: String,
    /// Creation time (local).
    pub created_at: NaiveDateTime,
}

/// Goal to reach `target_count`, optionally restricted to one hashtag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Total count to reach.
    pub target_count: i64,
    /// Only entries with this hashtag count toward the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashtag: Option<String>,
    /// Deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    /// Creation day.
    pub created_on: NaiveDate,
}

/// New photo for an existing project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPhoto {
    /// Target project id.
    pub project_id: String,
    /// Replacement photo.
    pub photo: PhotoRef,
}

/// The finished output of a dialog, handed to the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    /// See [`ProgressEntry`].
    Entry(ProgressEntry),
    /// See [`Project`].
    Project(Project),
    /// See [`EntryRemoval`].
    EntryRemoval(EntryRemoval),
    /// See [`WishlistItem`].
    WishlistItem(WishlistItem),
    /// See [`Note`].
    Note(Note),
    /// See [`Plan`].
    Plan(Plan),
    /// See [`ProjectPhoto`].
    ProjectPhoto(ProjectPhoto),
}

impl Record {
    /// The record's kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Entry(_) => RecordKind::Entry,
            Self::Project(_) => RecordKind::Project,
            Self::EntryRemoval(_) => RecordKind::EntryRemoval,
            Self::WishlistItem(_) => RecordKind::WishlistItem,
            Self::Note(_) => RecordKind::Note,
            Self::Plan(_) => RecordKind::Plan,
            Self::ProjectPhoto(_) => RecordKind::ProjectPhoto,
        }
    }

    /// User-visible summary sent when the dialog completes.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Entry(e) => {
                let mut text = format!(
                    "✅ Записано: {} за {}",
                    format_number(e.count),
                    format_date_long(e.date)
                );
                if let Some(tag) = &e.hashtag {
                    text.push_str(&format!(" (#{tag})"));
                }
                text
            }
            Self::Project(p) => {
                let mut text = format!("✅ Проект «{}» добавлен", p.name);
                if let Some(tag) = &p.hashtag {
                    text.push_str(&format!("\nХэштег: #{tag}"));
                }
                if p.photo.is_some() {
                    text.push_str("\nФото сохранено");
                }
                text
            }
            Self::EntryRemoval(r) => {
                format!("🗑 Записи за {} удалены", format_date_long(r.date))
            }
            Self::WishlistItem(w) => match &w.link {
                Some(link) => format!("✅ «{}» добавлено в вишлист\n{link}", w.name),
                None => format!("✅ «{}» добавлено в вишлист", w.name),
            },
            Self::Note(n) => format!("✅ Заметка «{}» сохранена", n.title),
            Self::Plan(p) => {
                let mut text = format!(
                    "✅ План «{}» создан: цель {}",
                    p.name,
                    format_number(p.target_count as f64)
                );
                if let Some(tag) = &p.hashtag {
                    text.push_str(&format!(" по #{tag}"));
                }
                if let Some(date) = p.target_date {
                    text.push_str(&format!(" до {}", format_date_long(date)));
                }
                text
            }
            Self::ProjectPhoto(_) => "✅ Фото проекта обновлено".to_string(),
        }
    }
}
