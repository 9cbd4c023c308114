//! Fixed Portuguese lexicon of violent-death vocabulary.
//!
//! Coarse gate only: a hit means "worth sending to the LLM", never a final
//! classification. Read-only after compile.

/// Verbs, outcome nouns, weapons, and institutional-context terms that
/// indicate a violent death in Brazilian crime reporting.
pub const MURDER_KEYWORDS: &[&str] = &[
    // Ações / verbos
    "matou",
    "mataram",
    "assassinou",
    "assassinaram",
    "executou",
    "executaram",
    "atirou",
    "atiraram",
    "baleou",
    "balearam",
    "esfaqueou",
    "esfaquearam",
    "disparou",
    "dispararam",
    "apontou arma",
    "alvejaram",
    "alvejado",
    "linchou",
    "lincharam",
    "estrangulou",
    "estrangularam",
    "degolou",
    "degolaram",
    "carbonizou",
    "carbonizaram",
    "desovou",
    "desovaram",
    // Resultados / substantivos
    "homicídio",
    "assassinato",
    "latrocínio",
    "feminicídio",
    "chacina",
    "massacre",
    "execução",
    "crime",
    "morte",
    "morto",
    "morta",
    "mortos",
    "mortas",
    "óbito",
    "cadáver",
    "corpo",
    "ossada",
    "vítima fatal",
    "vítimas fatais",
    "atentado",
    "baleado",
    "baleada",
    "esfaqueado",
    "esfaqueada",
    "troca de tiros",
    "tiroteio",
    "confronto",
    "emboscada",
    // Métodos / armas
    "tiro",
    "tiros",
    "bala",
    "balas",
    "arma de fogo",
    "revólver",
    "pistola",
    "fuzil",
    "faca",
    "facada",
    "facadas",
    "arma branca",
    "golpes",
    "projétil",
    "projéteis",
    "queima-roupa",
    "disparo",
    "disparos",
    // Contexto / agentes
    "polícia militar",
    "polícia civil",
    "pm",
    "bope",
    "choque",
    "traficante",
    "tráfico",
    "milícia",
    "miliciano",
    "facção",
    "comando vermelho",
    "tcp",
    "ada",
    "operação policial",
    "intervenção policial",
    "bala perdida",
    "encontrado morto",
    "encontrada morta",
    "corpo encontrado",
    "local do crime",
    "cena do crime",
    "iml",
    "instituto médico legal",
    "dh",
    "divisão de homicídios",
    "delegacia de homicídios",
];

/// Scan `text` for lexicon hits. Lowercases once, returns deduplicated
/// matches in lexicon order. Empty input yields no matches.
pub fn matches(text: &str) -> Vec<&'static str> {
    if text.is_empty() {
        return Vec::new();
    }
    let text_lower = text.to_lowercase();
    MURDER_KEYWORDS
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .copied()
        .collect()
}
