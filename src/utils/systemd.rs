use std::process::Command;
use tracing::{info, warn};

/// Запустить или остановить фоновый systemd-сервис приложения.
/// Сеанс настройки не должен конкурировать с фоновой копией за устройства,
/// поэтому она останавливается на время настройки. Любая ошибка здесь
/// не фатальна: сервис может быть просто не установлен.
pub fn set_service_state(service_name: &str, running: bool) {
    let verb = if running { "start" } else { "stop" };
    info!("systemctl {} {}", verb, service_name);

    match Command::new("systemctl").arg(verb).arg(service_name).status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!(
            "systemctl {} {} завершился с кодом {:?}",
            verb,
            service_name,
            status.code()
        ),
        Err(e) => warn!("Не удалось выполнить systemctl {}: {}", verb, e),
    }
}
