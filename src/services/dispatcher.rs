use crate::actions::{ActionRegistry, CleanupFn};
use crate::bindings::BindingTable;
use crate::debug_if_enabled;
use crate::events::{ButtonEvent, DeviceClass};
use crate::services::VirtualKeyboard;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

/// Режим работы диспетчера
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Биндинги запускают действия
    Run,
    /// Биндинги редактируются; действия не запускаются,
    /// но учёт отложенных cleanup продолжает работать
    Configure,
}

/// Обязательство выполнить cleanup последнего stateful-действия
/// до запуска любого следующего действия
struct PendingCleanup {
    action_name: &'static str,
    cleanup: CleanupFn,
}

struct DispatchState {
    mode: Mode,
    pending_cleanup: Option<PendingCleanup>,
    last_pointer_event: Option<ButtonEvent>,
    last_key_event: Option<ButtonEvent>,
    bindings: BindingTable,
}

/// Точка сбора событий всех наблюдателей. Всё изменяемое состояние лежит
/// под одним мьютексом: последовательность "прочитать отложенный cleanup,
/// выполнить, очистить" атомарна относительно событий с других устройств.
pub struct Dispatcher {
    keyboard: Arc<VirtualKeyboard>,
    registry: Arc<ActionRegistry>,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(
        keyboard: Arc<VirtualKeyboard>,
        registry: Arc<ActionRegistry>,
        bindings: BindingTable,
    ) -> Self {
        info!(
            "Инициализация Dispatcher (биндингов: {}, действий: {})",
            bindings.len(),
            registry.len()
        );

        Self {
            keyboard,
            registry,
            state: Mutex::new(DispatchState {
                mode: Mode::Run,
                pending_cleanup: None,
                last_pointer_event: None,
                last_key_event: None,
                bindings,
            }),
        }
    }

    /// Обработать нормализованное событие от любого наблюдателя
    pub fn handle_event(&self, event: ButtonEvent) {
        let mut state = self.state.lock();

        match event.class {
            DeviceClass::Pointer => self.on_pointer_event(&mut state, event),
            DeviceClass::Keyboard => self.on_keyboard_event(&mut state, event),
        }
    }

    fn on_pointer_event(&self, state: &mut DispatchState, event: ButtonEvent) {
        state.last_pointer_event = Some(event.clone());

        self.run_pending_cleanup(state, Some(&event));

        if state.mode != Mode::Run {
            debug_if_enabled!("Режим настройки: событие {} не запускает действий", event);
            return;
        }

        let Some(action_name) = state
            .bindings
            .lookup(&event.device_name, event.code)
            .map(String::from)
        else {
            return;
        };

        let Some(action) = self.registry.get(&action_name) else {
            // Документ мог ссылаться на действие, которого больше нет
            debug_if_enabled!("Неизвестное действие '{}' — пропускаем", action_name);
            return;
        };

        debug_if_enabled!("Запуск действия '{}' по событию {}", action.name, event);
        if let Err(e) = action.execute(&self.keyboard, &event) {
            error!("Ошибка выполнения действия '{}': {}", action.name, e);
        }

        state.pending_cleanup = action.cleanup_fn().map(|cleanup| PendingCleanup {
            action_name: action.name,
            cleanup,
        });
    }

    fn on_keyboard_event(&self, state: &mut DispatchState, event: ButtonEvent) {
        // Клавиатурные события не сверяются с таблицей биндингов:
        // они нужны только cleanup-учёту и сеансу настройки
        self.run_pending_cleanup(state, None);

        if state.mode == Mode::Configure && event.pressed {
            state.last_key_event = Some(event);
        }
    }

    fn run_pending_cleanup(&self, state: &mut DispatchState, event: Option<&ButtonEvent>) {
        if let Some(pending) = state.pending_cleanup.take() {
            debug_if_enabled!(
                "Cleanup действия '{}' перед обработкой нового события",
                pending.action_name
            );
            if let Err(e) = (pending.cleanup)(&self.keyboard, event) {
                error!("Ошибка cleanup действия '{}': {}", pending.action_name, e);
            }
        }
    }

    /// Выполнить отложенный cleanup без нового события (завершение работы)
    pub fn release_pending(&self) {
        let mut state = self.state.lock();
        self.run_pending_cleanup(&mut state, None);
    }

    #[allow(dead_code)]
    pub fn mode(&self) -> Mode {
        self.state.lock().mode
    }

    pub fn set_mode(&self, mode: Mode) {
        info!("Переключение диспетчера в режим {:?}", mode);
        self.state.lock().mode = mode;
    }

    pub fn bindings(&self) -> BindingTable {
        self.state.lock().bindings.clone()
    }

    pub fn insert_binding(&self, device_name: &str, code: u16, action: &str) {
        self.state.lock().bindings.insert(device_name, code, action);
    }

    /// Забрать последнее событие указывающего устройства (ячейка очищается)
    pub fn take_last_pointer_event(&self) -> Option<ButtonEvent> {
        self.state.lock().last_pointer_event.take()
    }

    /// Забрать последнее клавиатурное событие (ячейка очищается)
    pub fn take_last_key_event(&self) -> Option<ButtonEvent> {
        self.state.lock().last_key_event.take()
    }

    pub fn clear_last_events(&self) {
        let mut state = self.state.lock();
        state.last_pointer_event = None;
        state.last_key_event = None;
    }

    #[cfg(test)]
    fn has_pending_cleanup(&self) -> bool {
        self.state.lock().pending_cleanup.is_some()
    }
}
