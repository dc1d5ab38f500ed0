use crate::error::{PiperError, Result};
use crate::mappings::{text_to_strokes, Stroke};
use evdev::KeyCode;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info};

// Тип события EV_KEY в протоколе uinput
const EV_KEY: i32 = 1;

/// Приёмник сырых событий виртуального устройства. Отделяет логику
/// нажатий от конкретного бэкенда: боевой uinput, dry-run или память в тестах.
pub trait KeySink: Send {
    fn emit(&mut self, code: u16, value: i32) -> Result<()>;
    fn syn(&mut self) -> Result<()>;
}

struct UinputSink {
    device: uinput::Device,
}

impl KeySink for UinputSink {
    fn emit(&mut self, code: u16, value: i32) -> Result<()> {
        self.device
            .write(EV_KEY, code as i32, value)
            .map_err(|e| PiperError::internal(format!("Не удалось отправить событие клавиши {}: {}", code, e)))
    }

    fn syn(&mut self) -> Result<()> {
        self.device
            .synchronize()
            .map_err(|e| PiperError::internal(format!("Не удалось синхронизировать события: {}", e)))
    }
}

struct DrySink;

impl KeySink for DrySink {
    fn emit(&mut self, code: u16, value: i32) -> Result<()> {
        info!("[DRY RUN] Событие клавиши: code={} value={}", code, value);
        Ok(())
    }

    fn syn(&mut self) -> Result<()> {
        info!("[DRY RUN] Синхронизация");
        Ok(())
    }
}

struct Inner {
    sink: Box<dyn KeySink>,
    held: HashSet<u16>,
}

impl Inner {
    fn press(&mut self, code: u16) -> Result<()> {
        self.sink.emit(code, 1)?;
        self.held.insert(code);
        Ok(())
    }

    fn release(&mut self, code: u16) -> Result<()> {
        self.sink.emit(code, 0)?;
        self.held.remove(&code);
        Ok(())
    }

    fn click(&mut self, code: u16) -> Result<()> {
        self.press(code)?;
        self.release(code)
    }
}

/// Виртуальная клавиатура поверх uinput. Нажатия накапливаются в очереди
/// устройства и становятся видимыми потребителям только после flush():
/// один кадр синхронизации на логический жест.
pub struct VirtualKeyboard {
    inner: Mutex<Inner>,
    device_name: String,
}

impl VirtualKeyboard {
    pub fn new(device_name: &str, dry_run: bool) -> Result<Self> {
        info!(
            "Инициализация VirtualKeyboard '{}' (dry_run: {})",
            device_name, dry_run
        );

        let sink: Box<dyn KeySink> = if dry_run {
            Box::new(DrySink)
        } else {
            Box::new(UinputSink {
                device: Self::create_uinput_device(device_name)?,
            })
        };

        Ok(Self {
            inner: Mutex::new(Inner {
                sink,
                held: HashSet::new(),
            }),
            device_name: device_name.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_sink(sink: Box<dyn KeySink>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sink,
                held: HashSet::new(),
            }),
            device_name: "test-virtual-kb".to_string(),
        }
    }

    fn create_uinput_device(device_name: &str) -> Result<uinput::Device> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let device = uinput::default()?
            .name(device_name)
            .map_err(|e| {
                PiperError::internal(format!("Некорректное имя устройства '{}': {}", device_name, e))
            })?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| {
                PiperError::internal(format!(
                    "Не удалось создать виртуальное устройство '{}': {}",
                    device_name, e
                ))
            })?;

        info!("Виртуальное устройство '{}' создано", device_name);
        Ok(device)
    }

    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.device_name
    }

    /// Пометить клавишу нажатой. Без flush.
    pub fn press(&self, code: u16) -> Result<()> {
        self.inner.lock().press(code)
    }

    /// Пометить клавишу отпущенной. Без flush.
    pub fn release(&self, code: u16) -> Result<()> {
        self.inner.lock().release(code)
    }

    /// Нажатие и сразу отпускание; flush по желанию вызывающего
    pub fn click(&self, code: u16, flush: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.click(code)?;
        if flush {
            inner.sink.syn()?;
        }
        Ok(())
    }

    /// Зафиксировать накопленные изменения одним кадром синхронизации
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().sink.syn()
    }

    /// Набрать строку. Заглавные буквы и часть пунктуации оборачиваются
    /// в пару Shift-нажатий; ровно один flush в конце всей строки.
    pub fn type_text(&self, text: &str) -> Result<()> {
        let shift = KeyCode::KEY_LEFTSHIFT.code();
        let mut inner = self.inner.lock();

        for stroke in text_to_strokes(text) {
            match stroke {
                Stroke::Plain(code) => inner.click(code)?,
                Stroke::Shifted(code) => {
                    inner.press(shift)?;
                    inner.click(code)?;
                    inner.release(shift)?;
                }
            }
        }

        inner.sink.syn()
    }

    /// Отпустить все логически зажатые клавиши. Вызывается при завершении,
    /// чтобы виртуальное устройство не осталось с "залипшими" модификаторами.
    pub fn release_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();

        let held: Vec<u16> = inner.held.iter().copied().collect();
        if held.is_empty() {
            return Ok(());
        }

        debug!("Отпускаем {} зажатых клавиш", held.len());
        for code in held {
            inner.release(code)?;
        }
        inner.sink.syn()
    }

    /// Коды клавиш, логически зажатых в данный момент
    #[allow(dead_code)]
    pub fn held_keys(&self) -> Vec<u16> {
        let mut held: Vec<u16> = self.inner.lock().held.iter().copied().collect();
        held.sort_unstable();
        held
    }
}
