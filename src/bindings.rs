use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Пользовательская карта действий: имя устройства -> (кнопка -> действие).
/// Идентификаторы кнопок нормализуются в десятичную строку на границе
/// таблицы, поэтому числовая и строковая формы ключа эквивалентны.
///
/// Документ на диске имеет вид `{"action_map": {<device>: {<button>: <action>}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingTable {
    #[serde(default)]
    action_map: HashMap<String, HashMap<String, String>>,
}

impl BindingTable {
    /// Загрузить таблицу из JSON-документа. Отсутствующий или повреждённый
    /// файл трактуется как "биндинги не настроены" и не является ошибкой.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            warn!("Файл биндингов не найден: {:?}", path);
            return Self::default();
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Не удалось прочитать файл биндингов {:?}: {}", path, e);
                return Self::default();
            }
        };

        match serde_json::from_str::<BindingTable>(&raw) {
            Ok(table) => {
                info!(
                    "Загружено биндингов: {} (устройств: {})",
                    table.len(),
                    table.action_map.len()
                );
                table
            }
            Err(e) => {
                warn!("Файл биндингов {:?} повреждён: {}", path, e);
                Self::default()
            }
        }
    }

    /// Сохранить таблицу как JSON-документ, создавая каталог при необходимости
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;

        info!("Биндинги сохранены в {:?}", path);
        Ok(())
    }

    /// Найти имя действия для пары (устройство, кнопка)
    pub fn lookup(&self, device_name: &str, code: u16) -> Option<&str> {
        let buttons = self.action_map.get(device_name)?;
        let action = buttons.get(&code.to_string());
        if action.is_none() {
            debug!("Нет биндинга для {} кнопки {}", device_name, code);
        }
        action.map(String::as_str)
    }

    pub fn insert(&mut self, device_name: &str, code: u16, action: &str) {
        self.action_map
            .entry(device_name.to_string())
            .or_default()
            .insert(code.to_string(), action.to_string());
    }

    pub fn len(&self) -> usize {
        self.action_map.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.action_map.is_empty()
    }

    /// Итератор (устройство, кнопка, действие) для вывода текущей конфигурации
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.action_map.iter().flat_map(|(device, buttons)| {
            buttons
                .iter()
                .map(move |(button, action)| (device.as_str(), button.as_str(), action.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mice-piper-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_numeric_and_string_forms_are_equivalent() {
        // Таблица, заполненная через insert с числовым кодом
        let mut inserted = BindingTable::default();
        inserted.insert("test-mouse", 5, "Copy");

        // Та же таблица, прочитанная из документа со строковым ключом
        let parsed: BindingTable =
            serde_json::from_str(r#"{"action_map": {"test-mouse": {"5": "Copy"}}}"#).unwrap();

        assert_eq!(inserted, parsed);
        assert_eq!(inserted.lookup("test-mouse", 5), Some("Copy"));
        assert_eq!(parsed.lookup("test-mouse", 5), Some("Copy"));
    }

    #[test]
    fn test_lookup_unbound() {
        let mut table = BindingTable::default();
        table.insert("test-mouse", 275, "Paste");

        assert_eq!(table.lookup("test-mouse", 276), None);
        assert_eq!(table.lookup("other-mouse", 275), None);
    }

    #[test]
    fn test_load_missing_file() {
        let table = BindingTable::load("/non/existent/config.json");
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_malformed_document() {
        let path = temp_path("malformed.json");
        fs::write(&path, "{ это не json").unwrap();

        let table = BindingTable::load(&path);
        assert!(table.is_empty());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_wrong_structure() {
        let path = temp_path("wrong-structure.json");
        fs::write(&path, r#"{"action_map": "не карта"}"#).unwrap();

        let table = BindingTable::load(&path);
        assert!(table.is_empty());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("roundtrip.json");

        let mut table = BindingTable::default();
        table.insert("test-mouse", 275, "Copy");
        table.insert("test-mouse", 276, "Paste");
        table.insert("other-mouse", 277, "Menu");
        table.save(&path).unwrap();

        let loaded = BindingTable::load(&path);
        assert_eq!(loaded, table);
        assert_eq!(loaded.len(), 3);

        let _ = fs::remove_file(&path);
    }
}
