use crate::config::DeviceLimits;
use crate::events::DeviceClass;
use evdev::{AttributeSet, AttributeSetRef, Device, KeyCode};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Физическое устройство, открытое перечислителем и готовое к наблюдению
pub struct ClaimedDevice {
    pub device: Device,
    pub name: String,
    pub path: PathBuf,
    pub class: DeviceClass,
}

/// Однократное сканирование /dev/input: каждое event-устройство
/// классифицируется по набору поддерживаемых кнопок/клавиш.
/// Недоступные устройства пропускаются, сканирование никогда не прерывается.
pub struct DeviceEnumerator {
    limits: DeviceLimits,
}

impl DeviceEnumerator {
    pub fn new(limits: DeviceLimits) -> Self {
        Self { limits }
    }

    pub fn enumerate(&self) -> Vec<ClaimedDevice> {
        let mut claimed = Vec::new();

        let entries = match fs::read_dir("/dev/input") {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Нет доступа к /dev/input: {}. Добавьте пользователя в группу 'input'",
                    e
                );
                return claimed;
            }
        };

        let mut event_paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with("event"))
            })
            .collect();
        event_paths.sort();

        for path in event_paths {
            match self.claim(&path) {
                Some(device) => {
                    info!(
                        "Найдено устройство ({}): {:?} ({})",
                        device.class, device.path, device.name
                    );
                    claimed.push(device);
                }
                None => debug!("Устройство {:?} пропущено", path),
            }
        }

        if claimed.is_empty() {
            warn!("Не найдено ни одного подходящего устройства ввода");
        }

        claimed
    }

    fn claim(&self, path: &Path) -> Option<ClaimedDevice> {
        let device = match Device::open(path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть устройство {:?}: {}", path, e);
                return None;
            }
        };

        let class = device
            .supported_keys()
            .and_then(|keys| classify_keys(keys, &self.limits))?;

        let name = device.name().unwrap_or("Unknown").to_string();

        Some(ClaimedDevice {
            device,
            name,
            path: path.to_path_buf(),
            class,
        })
    }
}

/// Классифицировать устройство по набору кодов EV_KEY.
///
/// Указывающее устройство: есть обе основные кнопки мыши, а общее число
/// кодов укладывается в диапазон — это отсекает и двухкнопочные гарнитуры,
/// и полноценные клавиатуры. Клавиатура: есть опорная пара букв C/V
/// и кодов строго больше порога.
pub fn classify_keys(keys: &AttributeSetRef<KeyCode>, limits: &DeviceLimits) -> Option<DeviceClass> {
    let count = keys.iter().count();

    if keys.contains(KeyCode::BTN_LEFT)
        && keys.contains(KeyCode::BTN_RIGHT)
        && count >= limits.pointer_min_buttons
        && count <= limits.pointer_max_buttons
    {
        return Some(DeviceClass::Pointer);
    }

    if keys.contains(KeyCode::KEY_C)
        && keys.contains(KeyCode::KEY_V)
        && count > limits.keyboard_min_keys
    {
        return Some(DeviceClass::Keyboard);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_set(codes: &[KeyCode]) -> AttributeSet<KeyCode> {
        let mut set = AttributeSet::new();
        for code in codes {
            set.insert(*code);
        }
        set
    }

    fn limits() -> DeviceLimits {
        DeviceLimits::default()
    }

    #[test]
    fn test_five_button_mouse_is_pointer() {
        let keys = key_set(&[
            KeyCode::BTN_LEFT,
            KeyCode::BTN_RIGHT,
            KeyCode::BTN_MIDDLE,
            KeyCode::BTN_SIDE,
            KeyCode::BTN_EXTRA,
        ]);
        assert_eq!(classify_keys(&keys, &limits()), Some(DeviceClass::Pointer));
    }

    #[test]
    fn test_two_button_device_is_neither() {
        let keys = key_set(&[KeyCode::BTN_LEFT, KeyCode::BTN_RIGHT]);
        assert_eq!(classify_keys(&keys, &limits()), None);
    }

    #[test]
    fn test_three_buttons_is_lower_pointer_bound() {
        let keys = key_set(&[KeyCode::BTN_LEFT, KeyCode::BTN_RIGHT, KeyCode::BTN_MIDDLE]);
        assert_eq!(classify_keys(&keys, &limits()), Some(DeviceClass::Pointer));
    }

    #[test]
    fn test_too_many_buttons_excludes_pointer() {
        // 20 кодов: больше pointer_max_buttons — не мышь и не клавиатура
        let mut set = key_set(&[KeyCode::BTN_LEFT, KeyCode::BTN_RIGHT]);
        for code in 0x120..0x132u16 {
            set.insert(KeyCode::new(code));
        }
        assert_eq!(set.iter().count(), 20);
        assert_eq!(classify_keys(&set, &limits()), None);
    }

    #[test]
    fn test_full_keyboard() {
        // 61 клавиша, включая опорную пару C/V
        let mut set = key_set(&[KeyCode::KEY_C, KeyCode::KEY_V]);
        for code in 59..118u16 {
            set.insert(KeyCode::new(code));
        }
        assert_eq!(set.iter().count(), 61);
        assert_eq!(classify_keys(&set, &limits()), Some(DeviceClass::Keyboard));
    }

    #[test]
    fn test_many_keys_without_fingerprint_pair() {
        // Много клавиш, но без опорной пары — не клавиатура
        let mut set = AttributeSet::new();
        for code in 59..118u16 {
            set.insert(KeyCode::new(code));
        }
        assert_eq!(classify_keys(&set, &limits()), None);
    }

    #[test]
    fn test_small_macro_pad_is_not_keyboard() {
        // C и V есть, но клавиш слишком мало
        let keys = key_set(&[
            KeyCode::KEY_C,
            KeyCode::KEY_V,
            KeyCode::KEY_X,
            KeyCode::KEY_Z,
        ]);
        assert_eq!(classify_keys(&keys, &limits()), None);
    }
}
