use super::emulator::Emulator;
use pocketcore::joypad::Key;
use sdl2::EventPump;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

/// Maps a host keycode onto one of the core's eight logical keys, if any.
fn map_key(keycode: Keycode) -> Option<Key> {
    match keycode {
        Keycode::Up => Some(Key::Up),
        Keycode::Down => Some(Key::Down),
        Keycode::Left => Some(Key::Left),
        Keycode::Right => Some(Key::Right),
        Keycode::Z => Some(Key::A),
        Keycode::X => Some(Key::B),
        Keycode::Return => Some(Key::Start),
        Keycode::RShift | Keycode::Backspace => Some(Key::Select),
        _ => None,
    }
}

/// Polls SDL events and updates the emulator's joypad state.
/// Returns `true` if the quit event was received, `false` otherwise.
pub fn handle_input(event_pump: &mut EventPump, emulator: &mut Emulator) -> bool {
    for event in event_pump.poll_iter() {
        match event {
            Event::Quit { .. }
            | Event::KeyDown {
                keycode: Some(Keycode::Escape),
                ..
            } => {
                log::info!("exit requested");
                return true;
            }
            Event::KeyDown {
                keycode: Some(keycode),
                repeat: false,
                ..
            } => {
                if let Some(key) = map_key(keycode) {
                    emulator.key_down(key);
                }
            }
            Event::KeyUp {
                keycode: Some(keycode),
                repeat: false,
                ..
            } => {
                if let Some(key) = map_key(keycode) {
                    emulator.key_up(key);
                }
            }
            _ => {}
        }
    }
    false
}
