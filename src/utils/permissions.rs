use crate::error::{PiperError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

/// Проверить доступ к /dev/input и /dev/uinput до инициализации сервисов.
/// Ошибка здесь понятнее пользователю, чем череда отказов при перечислении.
pub fn check_permissions() -> Result<()> {
    check_input_access()?;
    check_uinput_access()?;
    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_access() -> Result<()> {
    let input_dir = Path::new("/dev/input");

    if !input_dir.exists() {
        return Err(PiperError::Permission(
            "Каталог /dev/input не существует".to_string(),
        ));
    }

    fs::read_dir(input_dir).map_err(|e| {
        PiperError::Permission(format!(
            "Нет доступа к /dev/input: {}. Добавьте пользователя в группу 'input': \
             sudo usermod -a -G input $USER",
            e
        ))
    })?;

    Ok(())
}

fn check_uinput_access() -> Result<()> {
    let uinput_device = Path::new("/dev/uinput");

    if !uinput_device.exists() {
        // Не фатально: модуль uinput может быть загружен позже
        warn!("/dev/uinput не существует — выполните: sudo modprobe uinput");
        return Ok(());
    }

    let metadata = fs::metadata(uinput_device).map_err(|e| {
        PiperError::Permission(format!("Не удалось проверить права на /dev/uinput: {}", e))
    })?;

    let mode = metadata.permissions().mode();
    if mode & 0o006 == 0 && mode & 0o060 == 0 {
        return Err(PiperError::Permission(
            "Нет прав на запись в /dev/uinput. Добавьте пользователя в группу 'uinput' \
             или настройте udev-правило"
                .to_string(),
        ));
    }

    Ok(())
}
