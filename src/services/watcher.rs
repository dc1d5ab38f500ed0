use crate::events::{ButtonEvent, DeviceClass};
use evdev::{Device, EventType};
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

// Таймаут poll(2): верхняя граница задержки реакции на stop()
const POLL_TIMEOUT_MS: i32 = 100;

/// Наблюдатель одного физического устройства: отдельный поток с блокирующим
/// чтением, который нормализует сырые события и отправляет их в общий канал
/// диспетчера. Устройством владеет поток, поэтому дескриптор освобождается
/// ровно один раз — при выходе из цикла.
pub struct DeviceWatcher {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeviceWatcher {
    pub fn spawn(
        device: Device,
        name: String,
        class: DeviceClass,
        tx: UnboundedSender<ButtonEvent>,
    ) -> Self {
        let thread_name = name.clone();
        Self::spawn_loop(name, move |stop| {
            watch_loop(device, thread_name, class, stop, tx);
        })
    }

    fn spawn_loop(name: String, body: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = std::thread::spawn(move || body(stop_flag));

        Self {
            name,
            stop,
            handle: Some(handle),
        }
    }

    /// Остановить наблюдателя. Идемпотентно: повторные вызовы (в том числе
    /// неявный из Drop) безопасны, поток присоединяется не более одного раза.
    pub fn stop(&mut self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            debug!("[{}] Запрошена остановка наблюдателя", self.name);
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[{}] Поток наблюдателя завершился с паникой", self.name);
            }
        }
    }

    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_loop(
    mut device: Device,
    name: String,
    class: DeviceClass,
    stop: Arc<AtomicBool>,
    tx: UnboundedSender<ButtonEvent>,
) {
    let fd = device.as_raw_fd();
    info!("[{}] Начато прослушивание ({})", name, class);

    while !stop.load(Ordering::SeqCst) {
        // Ждём данных с таймаутом, чтобы периодически проверять флаг остановки
        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pollfd, 1, POLL_TIMEOUT_MS) };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!("[{}] Ошибка poll: {}", name, err);
            break;
        }
        if ret == 0 {
            continue;
        }

        let events = match device.fetch_events() {
            Ok(events) => events.collect::<Vec<_>>(),
            Err(e) => {
                // Типичный случай — устройство отключено. Без переподключения.
                error!("[{}] Чтение прервано: {}", name, e);
                break;
            }
        };

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }

            let pressed = match event.value() {
                1 => true,
                0 => false,
                // Аппаратные автоповторы не интересуют диспетчера
                _ => continue,
            };

            let button_event = ButtonEvent::new(name.clone(), class, event.code(), pressed);
            debug!("[{}] Событие: {}", name, button_event);

            if tx.send(button_event).is_err() {
                info!("[{}] Диспетчер завершён, останавливаем наблюдателя", name);
                return;
            }
        }
    }

    info!("[{}] Прослушивание остановлено", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Суррогат дескриптора устройства: считает, сколько раз его отпустили
    struct FdGuard(Arc<AtomicUsize>);

    impl Drop for FdGuard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn spawn_blocked_watcher(drops: Arc<AtomicUsize>) -> DeviceWatcher {
        let guard = FdGuard(drops);
        DeviceWatcher::spawn_loop("test-watcher".to_string(), move |stop| {
            let _guard = guard;
            while !stop.load(Ordering::SeqCst) {
                // Имитация блокирующего чтения с таймаутом poll(2)
                std::thread::sleep(Duration::from_millis(POLL_TIMEOUT_MS as u64));
            }
        })
    }

    #[test]
    fn test_stop_interrupts_blocked_loop_and_releases_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut watcher = spawn_blocked_watcher(drops.clone());

        watcher.stop();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_stop_is_idempotent() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut watcher = spawn_blocked_watcher(drops.clone());

        watcher.stop();
        watcher.stop();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_then_drop_joins_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let mut watcher = spawn_blocked_watcher(drops.clone());

        watcher.stop();
        drop(watcher);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
