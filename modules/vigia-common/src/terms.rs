//! Compiled-in query expansion tables for the feed grid.

/// Topic terms appended (quoted) to the base query under `--expand`.
pub const EXPANSION_TERMS: &[&str] = &[
    "homicídio",
    "assassinato",
    "morto",
    "tiroteio",
    "baleado",
    "corpo encontrado",
    "polícia",
    "milícia",
    "tráfico",
];

/// Rio localities queried directly under `--geo`. Mix of zonas, large
/// neighborhoods, and the complexos that dominate crime coverage.
pub const GEO_TERMS: &[&str] = &[
    "Zona Norte Rio de Janeiro",
    "Zona Oeste Rio de Janeiro",
    "Zona Sul Rio de Janeiro",
    "Baixada Fluminense",
    "Complexo do Alemão",
    "Complexo da Maré",
    "Rocinha",
    "Cidade de Deus",
    "Jacarezinho",
    "Penha Rio de Janeiro",
    "Madureira",
    "Bangu",
    "Campo Grande Rio de Janeiro",
    "Santa Cruz Rio de Janeiro",
    "Duque de Caxias",
    "Nova Iguaçu",
    "São Gonçalo",
    "Niterói",
];

/// Build the full query list for one ingest run: base query, then quoted
/// topic expansions, then geo queries.
pub fn build_queries(base: &str, expand: bool, geo: bool) -> Vec<String> {
    let mut queries = vec![base.to_string()];
    if expand {
        for term in EXPANSION_TERMS {
            queries.push(format!("{base} \"{term}\""));
        }
    }
    if geo {
        queries.extend(GEO_TERMS.iter().map(|t| t.to_string()));
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_only() {
        assert_eq!(build_queries("Rio de Janeiro", false, false), vec!["Rio de Janeiro"]);
    }

    #[test]
    fn expand_quotes_terms() {
        let queries = build_queries("Rio de Janeiro", true, false);
        assert_eq!(queries.len(), 1 + EXPANSION_TERMS.len());
        assert!(queries.contains(&"Rio de Janeiro \"tiroteio\"".to_string()));
    }

    #[test]
    fn geo_appends_localities() {
        let queries = build_queries("Rio de Janeiro", false, true);
        assert_eq!(queries.len(), 1 + GEO_TERMS.len());
        assert!(queries.contains(&"Rocinha".to_string()));
    }
}
