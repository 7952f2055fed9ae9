//! Inline symbol command mappings
//!
//! Text-mode symbol commands that the inline normalizer converts straight
//! to Unicode. Math-mode symbols never reach this table because math is
//! extracted before inline normalization runs.

use phf::phf_map;

/// Zero-argument text symbol commands, command name (without backslash) to
/// replacement text.
pub static TEXT_SYMBOLS: phf::Map<&'static str, &'static str> = phf_map! {
    "ldots" => "…",
    "dots" => "…",
    "textellipsis" => "…",
    "textbullet" => "•",
    "textdagger" => "†",
    "textdaggerdbl" => "‡",
    "textdegree" => "°",
    "textminus" => "−",
    "textendash" => "–",
    "textemdash" => "—",
    "textquotesingle" => "'",
    "textasciitilde" => "~",
    "textasciicircum" => "^",
    "textbackslash" => "\\",
    "textbar" => "|",
    "textless" => "<",
    "textgreater" => ">",
    "textsection" => "§",
    "textparagraph" => "¶",
    "textperthousand" => "‰",
    "textonehalf" => "½",
    "textonequarter" => "¼",
    "textthreequarters" => "¾",
    "textregistered" => "®",
    "textcopyright" => "©",
    "texttrademark" => "™",
    "textsterling" => "£",
    "texteuro" => "€",
    "copyright" => "©",
    "pounds" => "£",
    "euro" => "€",
    "S" => "§",
    "P" => "¶",
    "dag" => "†",
    "ddag" => "‡",
    "LaTeX" => "LaTeX",
    "TeX" => "TeX",
    "today" => "",
    "noindent" => "",
    "indent" => "",
    "newpage" => "",
    "clearpage" => "",
    "smallskip" => " ",
    "medskip" => " ",
    "bigskip" => " ",
    "quad" => "\u{2003}",
    "qquad" => "\u{2003}\u{2003}",
};

/// Escaped special characters, the char after the backslash to its literal.
pub static ESCAPED_SPECIALS: phf::Map<char, &'static str> = phf_map! {
    '%' => "%",
    '&' => "&amp;",
    '_' => "_",
    '#' => "#",
    '$' => "$",
    '{' => "{",
    '}' => "}",
    ' ' => " ",
};
