use crate::actions::ActionRegistry;
use crate::config::Settings;
use crate::error::{PiperError, Result};
use crate::events::ButtonEvent;
use crate::services::Dispatcher;
use evdev::KeyCode;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Результат ожидания в цикле настройки
enum Captured {
    Button(ButtonEvent),
    Exit,
}

/// Интерактивный сеанс настройки биндингов. Диспетчер в это время находится
/// в режиме Configure: наблюдатели продолжают работать, но действия не
/// запускаются — их последние события опрашиваются отсюда с фиксированным
/// коротким интервалом.
///
/// Управление с клавиатуры: X — выход, S — сохранить, V — показать биндинги.
pub struct Configurator {
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ActionRegistry>,
    settings: Arc<Settings>,
}

impl Configurator {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        registry: Arc<ActionRegistry>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            settings,
        }
    }

    pub async fn run(&self) -> Result<()> {
        info!("Запуск сеанса настройки биндингов");

        loop {
            println!("\n👉 Нажмите кнопку мыши ('X' — выход, 'S' — сохранить, 'V' — показать биндинги)...");
            self.dispatcher.clear_last_events();

            let event = match self.wait_for_capture().await? {
                Captured::Button(event) => event,
                Captured::Exit => break,
            };

            println!("\n🖱 Нажата кнопка: {}-{} ({})", event.code, event.label, event.device_name);

            if let Some(action) = self.select_action().await? {
                self.dispatcher
                    .insert_binding(&event.device_name, event.code, action);
                println!(
                    "✅ Действие '{}' назначено на кнопку {}-{}",
                    action, event.code, event.label
                );
            }
        }

        info!("Сеанс настройки завершён");
        Ok(())
    }

    /// Опрашивать ячейки последних событий до нажатия кнопки мыши
    /// или управляющей клавиши
    async fn wait_for_capture(&self) -> Result<Captured> {
        let interval = Duration::from_millis(self.settings.configure.poll_interval_ms);

        loop {
            sleep(interval).await;

            if let Some(key_event) = self.dispatcher.take_last_key_event() {
                match KeyCode::new(key_event.code) {
                    KeyCode::KEY_X => {
                        println!("Выход из настройки.");
                        return Ok(Captured::Exit);
                    }
                    KeyCode::KEY_S => {
                        self.save_bindings()?;
                        println!("💾 Конфигурация сохранена");
                    }
                    KeyCode::KEY_V => self.print_bindings(),
                    _ => {}
                }
            }

            // Быстрый клик может перезаписать нажатие отпусканием в пределах
            // одного интервала опроса; кнопка та же, поэтому годится любое
            if let Some(pointer_event) = self.dispatcher.take_last_pointer_event() {
                return Ok(Captured::Button(pointer_event));
            }
        }
    }

    fn save_bindings(&self) -> Result<()> {
        self.dispatcher.bindings().save(&self.settings.bindings.path)
    }

    fn print_bindings(&self) {
        let bindings = self.dispatcher.bindings();
        if bindings.is_empty() {
            println!("Биндинги не настроены");
            return;
        }
        for (device, button, action) in bindings.entries() {
            println!("{} / {} : {}", device, button, action);
        }
    }

    /// Показать нумерованный каталог действий и прочитать выбор со stdin.
    /// Возвращает None при отмене ('C') или конце ввода.
    async fn select_action(&self) -> Result<Option<&'static str>> {
        let names = self.registry.names();

        tokio::task::spawn_blocking(move || -> Result<Option<&'static str>> {
            println!("Выберите действие:");
            for (idx, name) in names.iter().enumerate() {
                println!("  {}. {}", idx + 1, name);
            }

            let stdin = io::stdin();
            loop {
                print!("Введите номер действия (или 'C' для отмены): ");
                io::stdout().flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    return Ok(None);
                }

                let choice = line.trim().to_uppercase();
                if choice == "C" {
                    println!("Отменено.");
                    return Ok(None);
                }

                if let Ok(number) = choice.parse::<usize>() {
                    if (1..=names.len()).contains(&number) {
                        return Ok(Some(names[number - 1]));
                    }
                }

                println!("⚠️ Неверный выбор. Попробуйте ещё раз.");
            }
        })
        .await
        .map_err(|e| PiperError::internal(format!("Поток чтения stdin прерван: {}", e)))?
    }
}
