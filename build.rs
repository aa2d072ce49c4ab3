use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Reserved words and the TokenType variant each one scans to. The map is
// built at compile time and `include!`d by token.rs.
const KEYWORDS: &[(&str, &str)] = &[
    ("and", "TokenType::And"),
    ("class", "TokenType::Class"),
    ("else", "TokenType::Else"),
    ("false", "TokenType::False"),
    ("for", "TokenType::For"),
    ("fun", "TokenType::Fun"),
    ("if", "TokenType::If"),
    ("nil", "TokenType::Nil"),
    ("or", "TokenType::Or"),
    ("print", "TokenType::Print"),
    ("return", "TokenType::Return"),
    ("super", "TokenType::Super"),
    ("this", "TokenType::This"),
    ("true", "TokenType::True"),
    ("var", "TokenType::Var"),
    ("while", "TokenType::While"),
];

fn main() {
    let path = Path::new(&env::var("OUT_DIR").unwrap()).join("keywords.rs");
    let mut file = BufWriter::new(File::create(&path).unwrap());

    let mut map = phf_codegen::Map::new();
    for (keyword, variant) in KEYWORDS {
        map.entry(*keyword, variant);
    }

    write!(
        &mut file,
        "pub static KEYWORDS: phf::Map<&'static str, TokenType> = {}",
        map.build()
    )
    .unwrap();
    writeln!(&mut file, ";").unwrap();
}
