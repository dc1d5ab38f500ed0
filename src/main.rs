use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod actions;
mod bindings;
mod config;
mod error;
mod events;
pub mod mappings;
mod services;
mod utils;

use actions::ActionRegistry;
use bindings::BindingTable;
use config::Settings;
use services::{Configurator, DeviceEnumerator, DeviceWatcher, Dispatcher, Mode, VirtualKeyboard};

#[derive(Parser, Debug)]
#[command(name = "mice-piper")]
#[command(about = "Утилита для назначения действий на дополнительные кнопки мыши")]
struct Args {
    /// Запустить интерактивную настройку биндингов
    #[arg(short, long)]
    configure: bool,

    /// Путь к файлу настроек
    #[arg(long, default_value = "/etc/mice-piper/piper.toml")]
    config: String,

    /// Режим сухого запуска (без создания виртуального устройства)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    info!("Запуск Mice Piper v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(Settings::load(&args.config)?);
    info!("Настройки загружены из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска — клавиши не инжектируются");
    } else {
        utils::permissions::check_permissions()?;
    }

    // Единственное виртуальное устройство на процесс
    let keyboard = Arc::new(VirtualKeyboard::new(
        &settings.virtual_keyboard.device_name,
        args.dry_run,
    )?);
    let registry = Arc::new(ActionRegistry::new(&settings));
    let bindings = BindingTable::load(&settings.bindings.path);
    let dispatcher = Arc::new(Dispatcher::new(keyboard.clone(), registry.clone(), bindings));

    // Наблюдатели всех подходящих устройств сходятся в один канал,
    // который потребляет единственный сериализованный цикл диспетчеризации
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let enumerator = DeviceEnumerator::new(settings.devices.clone());
    let mut watchers: Vec<DeviceWatcher> = enumerator
        .enumerate()
        .into_iter()
        .map(|claimed| DeviceWatcher::spawn(claimed.device, claimed.name, claimed.class, tx.clone()))
        .collect();
    drop(tx);

    info!("Запущено наблюдателей: {}", watchers.len());

    let dispatch_loop = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatcher.handle_event(event);
            }
            info!("Цикл диспетчеризации завершён");
        })
    };

    if args.configure {
        // Фоновая копия не должна конкурировать за устройства
        if settings.service.manage {
            utils::systemd::set_service_state(&settings.service.name, false);
        }

        dispatcher.set_mode(Mode::Configure);
        let configurator = Configurator::new(dispatcher.clone(), registry, settings.clone());
        if let Err(e) = configurator.run().await {
            error!("Ошибка сеанса настройки: {}", e);
        }

        if settings.service.manage {
            utils::systemd::set_service_state(&settings.service.name, true);
        }
    } else {
        match signal::ctrl_c().await {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(e) => error!("Ошибка при ожидании сигнала завершения: {}", e),
        }
    }

    info!("Завершение работы...");

    // Остановка наблюдателей закрывает канал и завершает цикл диспетчеризации
    for watcher in &mut watchers {
        watcher.stop();
    }

    // Сначала дождаться, пока цикл дочитает буфер канала: событие,
    // отправленное до остановки, ещё может взвести отложенный cleanup
    let shutdown = tokio::time::timeout(tokio::time::Duration::from_secs(5), dispatch_loop).await;
    match shutdown {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении цикла диспетчеризации"),
    }

    // Гарантируем отсутствие залипших клавиш на виртуальном устройстве
    dispatcher.release_pending();
    if let Err(e) = keyboard.release_all() {
        warn!("Не удалось отпустить зажатые клавиши: {}", e);
    }

    info!("Mice Piper завершил работу");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
