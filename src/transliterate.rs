//! Conversion of patient names into ASCII-safe text for file names and tables.

/// Turns arbitrary text into an ASCII-only string.
pub trait Transliterate {
    fn transliterate(&self, text: &str) -> String;
}

/// Russian/Ukrainian Cyrillic to Latin, in the common passport-style scheme.
/// Characters without a mapping become `_`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Cyrillic;

impl Transliterate for Cyrillic {
    fn transliterate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_ascii() {
                out.push(c);
                continue;
            }
            let lower = c.to_lowercase().next().unwrap_or(c);
            match latin(lower) {
                Some(latin) if c != lower => {
                    // capitalise only the first letter of a multi-letter mapping
                    let mut chars = latin.chars();
                    if let Some(first) = chars.next() {
                        out.push(first.to_ascii_uppercase());
                        out.push_str(chars.as_str());
                    }
                }
                Some(latin) => out.push_str(latin),
                None => out.push('_'),
            }
        }
        out
    }
}

fn latin(c: char) -> Option<&'static str> {
    Some(match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' => "e",
        'ё' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ъ' => "",
        'ы' => "y",
        'ь' => "",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        'і' => "i",
        'ї' => "yi",
        'є' => "ye",
        'ґ' => "g",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_names() {
        let t = Cyrillic;
        assert_eq!(t.transliterate("Иванов Иван Иванович"), "Ivanov Ivan Ivanovich");
        assert_eq!(t.transliterate("Щукина Юлия"), "Shchukina Yuliya");
        assert_eq!(t.transliterate("Жуков_Артём"), "Zhukov_Artem");
        assert_eq!(t.transliterate("Smith"), "Smith");
        assert_eq!(t.transliterate("李"), "_");
    }
}
