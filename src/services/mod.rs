pub mod configurator;
pub mod dispatcher;
pub mod enumerator;
pub mod virtual_keyboard;
pub mod watcher;

pub use configurator::Configurator;
pub use dispatcher::{Dispatcher, Mode};
pub use enumerator::DeviceEnumerator;
pub use virtual_keyboard::VirtualKeyboard;
pub use watcher::DeviceWatcher;
