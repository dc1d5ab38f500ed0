use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub devices: DeviceLimits,
    pub bindings: BindingsSettings,
    pub configure: ConfigureSettings,
    pub virtual_keyboard: VirtualKeyboardSettings,
    pub actions: ActionSettings,
    pub service: ServiceSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

/// Пороги классификации устройств. Значения подобраны эмпирически,
/// поэтому вынесены в конфигурацию, а не зашиты в перечислитель.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Минимальное число кнопок у указывающего устройства
    pub pointer_min_buttons: usize,
    /// Максимальное число кнопок: отсекает полноценные клавиатуры
    pub pointer_max_buttons: usize,
    /// Клавиатурой считается устройство со строго большим числом клавиш
    pub keyboard_min_keys: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BindingsSettings {
    /// Путь к JSON-документу с картой действий
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigureSettings {
    /// Интервал опроса последних событий в режиме настройки
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VirtualKeyboardSettings {
    pub device_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ActionSettings {
    /// Текст, печатаемый действием "Type Custom Text"
    pub custom_text: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Имя systemd-сервиса фоновой копии приложения
    pub name: String,
    /// Останавливать/запускать сервис вокруг сеанса настройки
    pub manage: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            devices: DeviceLimits::default(),
            bindings: BindingsSettings::default(),
            configure: ConfigureSettings::default(),
            virtual_keyboard: VirtualKeyboardSettings::default(),
            actions: ActionSettings::default(),
            service: ServiceSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            pointer_min_buttons: 3,
            pointer_max_buttons: 19,
            keyboard_min_keys: 40,
        }
    }
}

impl Default for BindingsSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/mice-piper/config.json"),
        }
    }
}

impl Default for ConfigureSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl Default for VirtualKeyboardSettings {
    fn default() -> Self {
        Self {
            device_name: "virtual-piper-kb".to_string(),
        }
    }
}

impl Default for ActionSettings {
    fn default() -> Self {
        Self {
            custom_text: String::new(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "mice-piper.service".to_string(),
            manage: true,
        }
    }
}

impl Settings {
    /// Загрузить настройки из TOML-файла и переменных окружения PIPER_*.
    /// Отсутствующий файл не является ошибкой: действуют значения по умолчанию.
    pub fn load<P: AsRef<Path>>(settings_path: P) -> Result<Self> {
        let settings_path = settings_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(settings_path))
            .merge(Env::prefixed("PIPER_").split("__"));

        let settings: Settings = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить настройки из {:?}", settings_path))?;

        settings.validate()?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.devices.pointer_min_buttons == 0 {
            anyhow::bail!("pointer_min_buttons должно быть больше 0");
        }

        if self.devices.pointer_min_buttons > self.devices.pointer_max_buttons {
            anyhow::bail!(
                "pointer_min_buttons ({}) больше pointer_max_buttons ({})",
                self.devices.pointer_min_buttons,
                self.devices.pointer_max_buttons
            );
        }

        if self.devices.keyboard_min_keys <= self.devices.pointer_max_buttons {
            anyhow::bail!(
                "keyboard_min_keys ({}) должно превышать pointer_max_buttons ({})",
                self.devices.keyboard_min_keys,
                self.devices.pointer_max_buttons
            );
        }

        if self.configure.poll_interval_ms < 10 {
            anyhow::bail!("poll_interval_ms должно быть минимум 10");
        }

        if self.virtual_keyboard.device_name.is_empty() {
            anyhow::bail!("Имя виртуального устройства не может быть пустым");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_validation() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "loud".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_inverted_pointer_range() {
        let mut settings = Settings::default();
        settings.devices.pointer_min_buttons = 25;
        settings.devices.pointer_max_buttons = 19;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_too_small_poll_interval() {
        let mut settings = Settings::default();
        settings.configure.poll_interval_ms = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let settings = Settings::load("/non/existent/piper.toml").unwrap();
        assert_eq!(settings.devices.pointer_min_buttons, 3);
        assert_eq!(settings.devices.pointer_max_buttons, 19);
        assert_eq!(settings.devices.keyboard_min_keys, 40);
    }
}
