//! Main menu and commands.
//!
//! Events the dialog engine leaves unhandled land here: `/start` and `/help`
//! show the menu, menu buttons start flows, and anything else gets a hint.

use needle::OwnerId;
use needle::engine::Outcome;
use needle::error::EngineResult;
use needle::flow::{FlowType, project_photo_seed};
use needle::input::{EventPayload, InboundEvent, command_name};
use needle::router::FlowRouter;
use needle::transport::{Button, Keyboard, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prefix of the per-project "change photo" button token.
pub const CHANGE_PHOTO_PREFIX: &str = "project_change_photo_";

const MENU_TEXT: &str = "🧵 **Дневник вышивальщицы**\n\nВыберите действие:";

const HELP_TEXT: &str = "**📖 Помощь**\n\n\
**Основные команды:**\n\
/start - Главное меню\n\
/add - Добавить крестики\n\
/cancel - Отменить текущий диалог";

const HINT_TEXT: &str = "Используйте /start для открытия меню";

/// Menu button tokens and the flows they start.
const MENU_FLOWS: [(&str, FlowType); 6] = [
    ("add_stitches", FlowType::AddEntry),
    ("add_project", FlowType::AddProject),
    ("delete_day", FlowType::DeleteEntry),
    ("wishlist_add", FlowType::AddWishlistItem),
    ("note_add", FlowType::AddNote),
    ("plan_add", FlowType::AddPlan),
];

/// What the menu makes of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    /// Show the main menu.
    ShowMenu,
    /// Show the command list with the menu buttons.
    Help,
    /// Start a flow.
    Start(FlowType),
    /// Replace the photo of the project with this id.
    ReplacePhoto(String),
    /// Nothing the bot understands.
    Unknown,
}

impl MenuAction {
    /// Classify an event the engine did not handle.
    #[must_use]
    pub fn parse(event: &InboundEvent) -> Self {
        match &event.payload {
            EventPayload::Text { content } => {
                match command_name(content, '/').map(str::to_ascii_lowercase).as_deref() {
                    Some("start") => Self::ShowMenu,
                    Some("help") => Self::Help,
                    Some("add") => Self::Start(FlowType::AddEntry),
                    _ => Self::Unknown,
                }
            }
            EventPayload::Button { token } => {
                if token == "main_menu" {
                    return Self::ShowMenu;
                }
                if let Some(id) = token.strip_prefix(CHANGE_PHOTO_PREFIX)
                    && !id.is_empty()
                {
                    return Self::ReplacePhoto(id.to_string());
                }
                MENU_FLOWS
                    .iter()
                    .find(|(t, _)| t == token)
                    .map_or(Self::Unknown, |(_, flow)| Self::Start(*flow))
            }
            EventPayload::Photo { .. } => Self::Unknown,
        }
    }
}

/// The main menu keyboard.
#[must_use]
pub fn menu_keyboard() -> Keyboard {
    vec![
        vec![
            Button::new("➕ Добавить крестики", "add_stitches"),
            Button::new("➕ Новая работа", "add_project"),
        ],
        vec![
            Button::new("📋 Новый план", "plan_add"),
            Button::new("📝 Новая заметка", "note_add"),
        ],
        vec![Button::new("🎁 Добавить в вишлист", "wishlist_add")],
        vec![Button::new("🗑️ Удалить запись за день", "delete_day")],
    ]
}

/// Answers events the dialog engine left unhandled.
pub struct MainMenu {
    router: FlowRouter,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for MainMenu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainMenu").finish_non_exhaustive()
    }
}

impl MainMenu {
    /// Create a menu starting flows through `router`.
    #[must_use]
    pub fn new(router: FlowRouter, transport: Arc<dyn Transport>) -> Self {
        Self { router, transport }
    }

    /// Act on an event. Returns the action taken and, for flow starts, the
    /// engine outcome.
    ///
    /// # Errors
    ///
    /// Fails only when starting a flow fails.
    pub async fn respond(&self, event: &InboundEvent) -> EngineResult<(MenuAction, Option<Outcome>)> {
        let owner = event.owner;
        let action = MenuAction::parse(event);
        debug!(owner = %owner, ?action, "menu action");

        let outcome = match &action {
            MenuAction::ShowMenu => {
                self.prompt(owner, MENU_TEXT, &menu_keyboard()).await;
                None
            }
            MenuAction::Help => {
                self.prompt(owner, HELP_TEXT, &menu_keyboard()).await;
                None
            }
            MenuAction::Start(flow) => Some(self.router.start(owner, *flow).await?),
            MenuAction::ReplacePhoto(project_id) => Some(
                self.router
                    .start_with(owner, FlowType::ReplaceProjectPhoto, project_photo_seed(project_id))
                    .await?,
            ),
            MenuAction::Unknown => {
                self.prompt(owner, HINT_TEXT, &Keyboard::new()).await;
                None
            }
        };
        Ok((action, outcome))
    }

    async fn prompt(&self, owner: OwnerId, text: &str, keyboard: &Keyboard) {
        if let Err(e) = self.transport.prompt(owner, text, keyboard).await {
            warn!(owner = %owner, error = %e, "failed to deliver menu message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use needle::engine::DialogEngine;
    use needle::flow::PROJECT_ID;
    use needle::store::MemoryRecordStore;
    use needle::testing::RecordingTransport;

    fn setup() -> (DialogEngine, MainMenu, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let engine = DialogEngine::builder()
            .records(Arc::new(MemoryRecordStore::new()))
            .transport(transport.clone())
            .build()
            .unwrap();
        let menu = MainMenu::new(engine.router(), transport.clone());
        (engine, menu, transport)
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(MenuAction::parse(&InboundEvent::text(1, " /start ")), MenuAction::ShowMenu);
        assert_eq!(MenuAction::parse(&InboundEvent::text(1, "/help")), MenuAction::Help);
        assert_eq!(
            MenuAction::parse(&InboundEvent::text(1, "/add")),
            MenuAction::Start(FlowType::AddEntry)
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::button(1, "plan_add")),
            MenuAction::Start(FlowType::AddPlan)
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::button(1, "project_change_photo_project-7")),
            MenuAction::ReplacePhoto("project-7".into())
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::button(1, CHANGE_PHOTO_PREFIX)),
            MenuAction::Unknown
        );
        assert_eq!(MenuAction::parse(&InboundEvent::photo(1, "f")), MenuAction::Unknown);
        assert_eq!(MenuAction::parse(&InboundEvent::text(1, "привет")), MenuAction::Unknown);
    }

    #[test]
    fn test_group_chat_commands_are_recognized() {
        assert_eq!(
            MenuAction::parse(&InboundEvent::text(1, "/start@needle_bot")),
            MenuAction::ShowMenu
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::text(1, "/HELP@needle_bot")),
            MenuAction::Help
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::text(1, "/add@needle_bot сейчас")),
            MenuAction::Start(FlowType::AddEntry)
        );
        assert_eq!(
            MenuAction::parse(&InboundEvent::text(1, "/started")),
            MenuAction::Unknown
        );
    }

    #[test]
    fn test_every_menu_flow_has_a_button() {
        let keyboard = menu_keyboard();
        for (token, _) in MENU_FLOWS {
            assert!(keyboard.iter().flatten().any(|b| b.token == token), "{token}");
        }
    }

    #[tokio::test]
    async fn test_start_shows_menu() {
        let (_engine, menu, transport) = setup();
        let (action, outcome) = menu.respond(&InboundEvent::text(1, "/start")).await.unwrap();
        assert_eq!(action, MenuAction::ShowMenu);
        assert!(outcome.is_none());

        let sent = transport.last().unwrap();
        assert!(sent.text.contains("Дневник вышивальщицы"));
        assert!(sent.has_button("add_stitches"));
        assert!(sent.has_button("delete_day"));
    }

    #[tokio::test]
    async fn test_menu_button_starts_flow() {
        let (engine, menu, transport) = setup();
        let (_, outcome) = menu
            .respond(&InboundEvent::button(3, "note_add"))
            .await
            .unwrap();
        assert!(matches!(outcome, Some(Outcome::Started { flow: FlowType::AddNote })));
        assert_eq!(engine.session(3).await.unwrap().unwrap().flow, FlowType::AddNote);
        assert!(transport.last().unwrap().text.contains("Добавление заметки"));
    }

    #[tokio::test]
    async fn test_change_photo_button_seeds_project() {
        let (engine, menu, _transport) = setup();
        menu.respond(&InboundEvent::button(3, "project_change_photo_project-7"))
            .await
            .unwrap();
        let session = engine.session(3).await.unwrap().unwrap();
        assert_eq!(session.flow, FlowType::ReplaceProjectPhoto);
        assert_eq!(session.fields.text(PROJECT_ID).unwrap(), "project-7");
    }

    #[tokio::test]
    async fn test_unknown_input_gets_hint() {
        let (engine, menu, transport) = setup();
        let (action, _) = menu.respond(&InboundEvent::text(4, "привет")).await.unwrap();
        assert_eq!(action, MenuAction::Unknown);
        assert_eq!(transport.last().unwrap().text, HINT_TEXT);
        assert!(engine.session(4).await.unwrap().is_none());
    }
}
