use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Artículos y conjunciones que no distinguen nombres de municipio.
const PALABRAS_VACIAS: [&str; 6] = ["de", "la", "del", "los", "las", "y"];

/// Normaliza un nombre para comparaciones tolerantes.
///
/// - minúsculas y sin tildes (descomposición NFD sin marcas combinantes)
/// - sin las palabras `de la del los las y` (palabras completas)
/// - cualquier racha no alfanumérica se convierte en un único espacio
/// - sin espacios al principio ni al final
///
/// `normalizar(normalizar(x)) == normalizar(x)`.
pub fn normalizar(texto: &str) -> String {
    let sin_tildes: String = texto
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    sin_tildes
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !PALABRAS_VACIAS.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Minúsculas y sin tildes, sin espacios en los extremos. No toca palabras
/// ni separadores.
pub fn plegar(texto: &str) -> String {
    texto
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// `true` si el nombre normalizado de `candidato` contiene el de `buscado`.
pub fn contiene_normalizado(candidato: &str, buscado: &str) -> bool {
    normalizar(candidato).contains(&normalizar(buscado))
}
