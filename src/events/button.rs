use std::fmt;

use evdev::KeyCode;

/// Класс физического устройства, определённый при перечислении
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Pointer,
    Keyboard,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Pointer => write!(f, "pointer"),
            DeviceClass::Keyboard => write!(f, "keyboard"),
        }
    }
}

/// Нормализованное событие кнопки/клавиши от одного из наблюдателей.
/// Создаётся заново на каждое физическое событие и потребляется диспетчером.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEvent {
    pub device_name: String,
    pub class: DeviceClass,
    pub code: u16,
    pub label: String,
    pub pressed: bool,
}

impl ButtonEvent {
    pub fn new(
        device_name: impl Into<String>,
        class: DeviceClass,
        code: u16,
        pressed: bool,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            class,
            code,
            label: button_label(code),
            pressed,
        }
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}[{}] {}",
            self.code,
            self.label,
            self.device_name,
            if self.pressed { "pressed" } else { "released" }
        )
    }
}

/// Символьное имя кнопки по её evdev-коду.
/// Для кодов без известного имени возвращается BTN_<код>.
pub fn button_label(code: u16) -> String {
    let label = format!("{:?}", KeyCode::new(code));
    if label.starts_with("KEY_") || label.starts_with("BTN_") {
        label
    } else {
        format!("BTN_{}", code)
    }
}
