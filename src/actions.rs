use crate::config::Settings;
use crate::error::Result;
use crate::events::ButtonEvent;
use crate::services::VirtualKeyboard;
use evdev::KeyCode;
use tracing::debug;

pub type RunFn = fn(&VirtualKeyboard, &ButtonEvent, Option<&str>) -> Result<()>;
pub type CleanupFn = fn(&VirtualKeyboard, Option<&ButtonEvent>) -> Result<()>;

/// Контракт действия. Stateful-вариант оставляет виртуальную клавиатуру
/// в ненейтральном состоянии (зажатый модификатор) и обязан предоставить
/// cleanup, который диспетчер вызовет перед следующим действием.
pub enum ActionKind {
    Simple(RunFn),
    Stateful { run: RunFn, cleanup: CleanupFn },
}

pub struct Action {
    pub name: &'static str,
    kind: ActionKind,
    data: Option<String>,
}

impl Action {
    fn simple(name: &'static str, run: RunFn) -> Self {
        Self {
            name,
            kind: ActionKind::Simple(run),
            data: None,
        }
    }

    fn stateful(name: &'static str, run: RunFn, cleanup: CleanupFn) -> Self {
        Self {
            name,
            kind: ActionKind::Stateful { run, cleanup },
            data: None,
        }
    }

    fn with_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    pub fn execute(&self, keyboard: &VirtualKeyboard, event: &ButtonEvent) -> Result<()> {
        let run = match self.kind {
            ActionKind::Simple(run) => run,
            ActionKind::Stateful { run, .. } => run,
        };
        run(keyboard, event, self.data.as_deref())
    }

    /// Cleanup, если действие stateful
    pub fn cleanup_fn(&self) -> Option<CleanupFn> {
        match self.kind {
            ActionKind::Simple(_) => None,
            ActionKind::Stateful { cleanup, .. } => Some(cleanup),
        }
    }
}

/// Неизменяемый каталог действий, собираемый один раз при старте.
/// Порядок вставки сохраняется: его показывает меню настройки.
pub struct ActionRegistry {
    actions: Vec<Action>,
}

impl ActionRegistry {
    pub fn new(settings: &Settings) -> Self {
        let custom_text = if settings.actions.custom_text.is_empty() {
            None
        } else {
            Some(settings.actions.custom_text.clone())
        };

        let actions = vec![
            Action::simple("Copy", action_copy),
            Action::simple("Paste", action_paste),
            Action::simple("Select all", action_select_all),
            Action::simple("Save", action_save),
            Action::simple("Delete", action_delete),
            Action::simple("Type Custom Text", action_type_custom_text).with_data(custom_text),
            Action::stateful("Menu", action_menu, action_menu_cleanup),
            Action::simple("Close current window", action_close_window),
            Action::simple("Minimise all windows", action_minimise_all),
            Action::simple("New terminal", action_new_terminal),
        ];

        Self { actions }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.actions.iter().map(|action| action.name).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

/// Аккорд: зажать модификаторы, кликнуть клавишу, отпустить модификаторы
/// в обратном порядке, зафиксировать одним кадром
fn chorded_click(keyboard: &VirtualKeyboard, modifiers: &[KeyCode], key: KeyCode) -> Result<()> {
    for modifier in modifiers {
        keyboard.press(modifier.code())?;
    }
    keyboard.click(key.code(), false)?;
    for modifier in modifiers.iter().rev() {
        keyboard.release(modifier.code())?;
    }
    keyboard.flush()
}

fn action_copy(keyboard: &VirtualKeyboard, event: &ButtonEvent, _data: Option<&str>) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTCTRL], KeyCode::KEY_C)?;
    }
    Ok(())
}

fn action_paste(keyboard: &VirtualKeyboard, event: &ButtonEvent, _data: Option<&str>) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTCTRL], KeyCode::KEY_V)?;
    }
    Ok(())
}

fn action_select_all(
    keyboard: &VirtualKeyboard,
    event: &ButtonEvent,
    _data: Option<&str>,
) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTCTRL], KeyCode::KEY_A)?;
    }
    Ok(())
}

fn action_save(keyboard: &VirtualKeyboard, event: &ButtonEvent, _data: Option<&str>) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTCTRL], KeyCode::KEY_S)?;
    }
    Ok(())
}

fn action_delete(keyboard: &VirtualKeyboard, event: &ButtonEvent, _data: Option<&str>) -> Result<()> {
    if event.pressed {
        keyboard.click(KeyCode::KEY_DELETE.code(), true)?;
    }
    Ok(())
}

fn action_type_custom_text(
    keyboard: &VirtualKeyboard,
    event: &ButtonEvent,
    data: Option<&str>,
) -> Result<()> {
    if event.pressed {
        match data {
            Some(text) => keyboard.type_text(text)?,
            None => debug!("Для 'Type Custom Text' не задан текст в настройках"),
        }
    }
    Ok(())
}

/// Alt удерживается до cleanup: повторные нажатия кнопки листают окна
fn action_menu(keyboard: &VirtualKeyboard, event: &ButtonEvent, _data: Option<&str>) -> Result<()> {
    if event.pressed {
        keyboard.release(KeyCode::KEY_LEFTALT.code())?;
        keyboard.flush()?;
        keyboard.press(KeyCode::KEY_LEFTALT.code())?;
        keyboard.click(KeyCode::KEY_TAB.code(), true)?;
    }
    Ok(())
}

fn action_menu_cleanup(keyboard: &VirtualKeyboard, _event: Option<&ButtonEvent>) -> Result<()> {
    keyboard.release(KeyCode::KEY_LEFTALT.code())?;
    keyboard.flush()
}

fn action_close_window(
    keyboard: &VirtualKeyboard,
    event: &ButtonEvent,
    _data: Option<&str>,
) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTALT], KeyCode::KEY_F4)?;
    }
    Ok(())
}

fn action_minimise_all(
    keyboard: &VirtualKeyboard,
    event: &ButtonEvent,
    _data: Option<&str>,
) -> Result<()> {
    if event.pressed {
        chorded_click(keyboard, &[KeyCode::KEY_LEFTMETA], KeyCode::KEY_D)?;
    }
    Ok(())
}

fn action_new_terminal(
    keyboard: &VirtualKeyboard,
    event: &ButtonEvent,
    _data: Option<&str>,
) -> Result<()> {
    if event.pressed {
        chorded_click(
            keyboard,
            &[KeyCode::KEY_LEFTCTRL, KeyCode::KEY_LEFTALT],
            KeyCode::KEY_T,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeviceClass;
    use crate::services::virtual_keyboard::testing::{MemorySink, SinkOp};

    fn keyboard() -> (
        VirtualKeyboard,
        std::sync::Arc<parking_lot::Mutex<Vec<SinkOp>>>,
    ) {
        let (sink, ops) = MemorySink::new();
        (VirtualKeyboard::with_sink(Box::new(sink)), ops)
    }

    fn press_event() -> ButtonEvent {
        ButtonEvent::new("test-mouse", DeviceClass::Pointer, 275, true)
    }

    fn release_event() -> ButtonEvent {
        ButtonEvent::new("test-mouse", DeviceClass::Pointer, 275, false)
    }

    #[test]
    fn test_registry_catalog() {
        let registry = ActionRegistry::new(&Settings::default());

        assert_eq!(registry.len(), 10);
        assert!(registry.get("Copy").is_some());
        assert!(registry.get("Menu").is_some());
        assert!(registry.get("Launch Missiles").is_none());

        // Меню настройки показывает действия в порядке каталога
        assert_eq!(registry.names()[0], "Copy");
        assert_eq!(registry.names()[1], "Paste");
    }

    #[test]
    fn test_copy_emits_ctrl_c_chord() {
        let (kb, ops) = keyboard();
        let registry = ActionRegistry::new(&Settings::default());

        registry.get("Copy").unwrap().execute(&kb, &press_event()).unwrap();

        let ctrl = KeyCode::KEY_LEFTCTRL.code();
        let c = KeyCode::KEY_C.code();
        assert_eq!(
            *ops.lock(),
            vec![
                SinkOp::Key(ctrl, 1),
                SinkOp::Key(c, 1),
                SinkOp::Key(c, 0),
                SinkOp::Key(ctrl, 0),
                SinkOp::Syn,
            ]
        );
    }

    #[test]
    fn test_release_event_is_noop() {
        let (kb, ops) = keyboard();
        let registry = ActionRegistry::new(&Settings::default());

        registry
            .get("Copy")
            .unwrap()
            .execute(&kb, &release_event())
            .unwrap();

        assert!(ops.lock().is_empty());
    }

    #[test]
    fn test_menu_is_stateful_and_holds_alt() {
        let (kb, _ops) = keyboard();
        let registry = ActionRegistry::new(&Settings::default());
        let menu = registry.get("Menu").unwrap();

        assert!(menu.cleanup_fn().is_some());
        assert!(registry.get("Copy").unwrap().cleanup_fn().is_none());

        menu.execute(&kb, &press_event()).unwrap();
        assert_eq!(kb.held_keys(), vec![KeyCode::KEY_LEFTALT.code()]);

        menu.cleanup_fn().unwrap()(&kb, None).unwrap();
        assert!(kb.held_keys().is_empty());
    }

    #[test]
    fn test_custom_text_uses_settings() {
        let (kb, ops) = keyboard();
        let mut settings = Settings::default();
        settings.actions.custom_text = "hi".to_string();
        let registry = ActionRegistry::new(&settings);

        registry
            .get("Type Custom Text")
            .unwrap()
            .execute(&kb, &press_event())
            .unwrap();

        let h = KeyCode::KEY_H.code();
        let i = KeyCode::KEY_I.code();
        assert_eq!(
            *ops.lock(),
            vec![
                SinkOp::Key(h, 1),
                SinkOp::Key(h, 0),
                SinkOp::Key(i, 1),
                SinkOp::Key(i, 0),
                SinkOp::Syn,
            ]
        );
    }

    #[test]
    fn test_custom_text_without_settings_is_noop() {
        let (kb, ops) = keyboard();
        let registry = ActionRegistry::new(&Settings::default());

        registry
            .get("Type Custom Text")
            .unwrap()
            .execute(&kb, &press_event())
            .unwrap();

        assert!(ops.lock().is_empty());
    }
}
