use evdev::KeyCode;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use tracing::warn;

/// Одно нажатие при наборе текста: либо сама клавиша, либо клавиша,
/// обёрнутая в нажатие/отпускание левого Shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Plain(u16),
    Shifted(u16),
}

// Пунктуация раскладки US. Часть символов требует Shift-пары.
static SYMBOL_STROKES: Lazy<HashMap<char, Stroke>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert(' ', Stroke::Plain(KeyCode::KEY_SPACE.code()));
    map.insert('\n', Stroke::Plain(KeyCode::KEY_ENTER.code()));
    map.insert('.', Stroke::Plain(KeyCode::KEY_DOT.code()));
    map.insert(',', Stroke::Plain(KeyCode::KEY_COMMA.code()));
    map.insert('!', Stroke::Shifted(KeyCode::KEY_1.code()));
    map.insert('?', Stroke::Shifted(KeyCode::KEY_SLASH.code()));
    map.insert(':', Stroke::Shifted(KeyCode::KEY_SEMICOLON.code()));
    map.insert(';', Stroke::Plain(KeyCode::KEY_SEMICOLON.code()));
    map.insert('\'', Stroke::Plain(KeyCode::KEY_APOSTROPHE.code()));
    map.insert('"', Stroke::Shifted(KeyCode::KEY_APOSTROPHE.code()));
    map.insert('-', Stroke::Plain(KeyCode::KEY_MINUS.code()));
    map.insert('_', Stroke::Shifted(KeyCode::KEY_MINUS.code()));
    map.insert('=', Stroke::Plain(KeyCode::KEY_EQUAL.code()));
    map.insert('+', Stroke::Shifted(KeyCode::KEY_EQUAL.code()));
    map.insert('/', Stroke::Plain(KeyCode::KEY_SLASH.code()));
    map.insert('\\', Stroke::Plain(KeyCode::KEY_BACKSLASH.code()));
    map.insert('[', Stroke::Plain(KeyCode::KEY_LEFTBRACE.code()));
    map.insert(']', Stroke::Plain(KeyCode::KEY_RIGHTBRACE.code()));
    map.insert('(', Stroke::Shifted(KeyCode::KEY_9.code()));
    map.insert(')', Stroke::Shifted(KeyCode::KEY_0.code()));

    map
});

fn letter_code(ch: char) -> Option<u16> {
    let code = match ch {
        'a' => KeyCode::KEY_A,
        'b' => KeyCode::KEY_B,
        'c' => KeyCode::KEY_C,
        'd' => KeyCode::KEY_D,
        'e' => KeyCode::KEY_E,
        'f' => KeyCode::KEY_F,
        'g' => KeyCode::KEY_G,
        'h' => KeyCode::KEY_H,
        'i' => KeyCode::KEY_I,
        'j' => KeyCode::KEY_J,
        'k' => KeyCode::KEY_K,
        'l' => KeyCode::KEY_L,
        'm' => KeyCode::KEY_M,
        'n' => KeyCode::KEY_N,
        'o' => KeyCode::KEY_O,
        'p' => KeyCode::KEY_P,
        'q' => KeyCode::KEY_Q,
        'r' => KeyCode::KEY_R,
        's' => KeyCode::KEY_S,
        't' => KeyCode::KEY_T,
        'u' => KeyCode::KEY_U,
        'v' => KeyCode::KEY_V,
        'w' => KeyCode::KEY_W,
        'x' => KeyCode::KEY_X,
        'y' => KeyCode::KEY_Y,
        'z' => KeyCode::KEY_Z,
        _ => return None,
    };
    Some(code.code())
}

fn digit_code(ch: char) -> Option<u16> {
    let code = match ch {
        '1' => KeyCode::KEY_1,
        '2' => KeyCode::KEY_2,
        '3' => KeyCode::KEY_3,
        '4' => KeyCode::KEY_4,
        '5' => KeyCode::KEY_5,
        '6' => KeyCode::KEY_6,
        '7' => KeyCode::KEY_7,
        '8' => KeyCode::KEY_8,
        '9' => KeyCode::KEY_9,
        '0' => KeyCode::KEY_0,
        _ => return None,
    };
    Some(code.code())
}

/// Разложить строку в последовательность нажатий.
/// Неподдерживаемые символы пропускаются с предупреждением,
/// остаток строки набирается дальше.
pub fn text_to_strokes(text: &str) -> Vec<Stroke> {
    let mut strokes = Vec::with_capacity(text.len());

    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            let code = letter_code(ch.to_ascii_lowercase()).expect("ascii letter");
            if ch.is_ascii_uppercase() {
                strokes.push(Stroke::Shifted(code));
            } else {
                strokes.push(Stroke::Plain(code));
            }
        } else if ch.is_ascii_digit() {
            strokes.push(Stroke::Plain(digit_code(ch).expect("ascii digit")));
        } else if let Some(stroke) = SYMBOL_STROKES.get(&ch) {
            strokes.push(*stroke);
        } else {
            warn!("Неподдерживаемый символ при наборе текста: {:?}", ch);
        }
    }

    strokes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_letters() {
        assert_eq!(
            text_to_strokes("hi"),
            vec![
                Stroke::Plain(KeyCode::KEY_H.code()),
                Stroke::Plain(KeyCode::KEY_I.code()),
            ]
        );
    }

    #[test]
    fn test_uppercase_requires_shift() {
        assert_eq!(
            text_to_strokes("Hi"),
            vec![
                Stroke::Shifted(KeyCode::KEY_H.code()),
                Stroke::Plain(KeyCode::KEY_I.code()),
            ]
        );
    }

    #[test]
    fn test_digits_and_symbols() {
        assert_eq!(
            text_to_strokes("4-2!"),
            vec![
                Stroke::Plain(KeyCode::KEY_4.code()),
                Stroke::Plain(KeyCode::KEY_MINUS.code()),
                Stroke::Plain(KeyCode::KEY_2.code()),
                Stroke::Shifted(KeyCode::KEY_1.code()),
            ]
        );
    }

    #[test]
    fn test_shift_pairs() {
        assert_eq!(
            text_to_strokes("(_)"),
            vec![
                Stroke::Shifted(KeyCode::KEY_9.code()),
                Stroke::Shifted(KeyCode::KEY_MINUS.code()),
                Stroke::Shifted(KeyCode::KEY_0.code()),
            ]
        );
    }

    #[test]
    fn test_unsupported_characters_are_skipped() {
        // Эмодзи пропускается, остальные символы набираются
        assert_eq!(
            text_to_strokes("a🦀b"),
            vec![
                Stroke::Plain(KeyCode::KEY_A.code()),
                Stroke::Plain(KeyCode::KEY_B.code()),
            ]
        );
    }
}
