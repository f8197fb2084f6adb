//! Built-in specialty table
//!
//! Plain data: which provider is good at what, and the Spanish keywords
//! and patterns that hint at it. Row order is the tie-break order.

use anymind_core::SpecialtySpec;

fn spec(provider: &str, specialty: &str, base_score: u32, keywords: &[&str], patterns: &[&str]) -> SpecialtySpec {
    SpecialtySpec {
        provider: provider.into(),
        specialty: specialty.into(),
        base_score,
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
        patterns: patterns.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn builtin_specialties() -> Vec<SpecialtySpec> {
    vec![
        spec(
            "perplexity",
            "búsqueda_tiempo_real",
            10,
            &[
                "busca", "buscar", "qué es", "quién es", "dónde está", "cuándo", "noticias",
                "actualidad", "hoy", "ahora", "último", "reciente", "información sobre",
                "datos de", "wikipedia", "google", "investiga", "averigua",
            ],
            &[
                r"\b(qué|que) es\b",
                r"\bquién es\b",
                r"\bdónde (está|queda|se encuentra)\b",
                r"\bcuándo (fue|es|será)\b",
                r"\bnoticias (de|sobre)\b",
                r"\bactualidad\b",
                r"\binformación sobre\b",
            ],
        ),
        spec(
            "groq",
            "síntesis_análisis",
            9,
            &[
                "analiza", "compara", "evalúa", "sintetiza", "resume", "explica", "razonamiento",
                "lógica", "argumenta", "pros y contras", "ventajas", "desventajas",
                "diferencia entre", "similar", "relacionado",
            ],
            &[
                r"\banaliz[ao]\b",
                r"\bcompar[ao]\b",
                r"\bevalú[ao]\b",
                r"\bresume\b",
                r"\bpros y contras\b",
                r"\bdiferencia entre\b",
            ],
        ),
        spec(
            "google",
            "razonamiento_general",
            8,
            &[
                "cómo", "por qué", "explica", "enseña", "tutorial", "paso a paso", "guía",
                "instrucciones", "método",
            ],
            &[
                r"\bcómo (hacer|hacer para|se hace)\b",
                r"\bpor qué\b",
                r"\bexplica(me)?\b",
                r"\bpaso a paso\b",
            ],
        ),
        spec(
            "cohere",
            "redacción_profesional",
            8,
            &[
                "escribe", "redacta", "carta", "email", "correo", "profesional", "formal",
                "documento", "informe", "resumen", "reporte", "clasifica", "categoriza",
            ],
            &[
                r"\bescribe (un|una)\b",
                r"\bredact[ao]\b",
                r"\bcarta (de|para)\b",
                r"\bemail\b",
                r"\bresumen de\b",
            ],
        ),
        spec(
            "microsoft_copilot",
            "asistente_general",
            9,
            &[
                "código", "programa", "función", "clase", "script", "python", "javascript",
                "typescript", "java", "c++", "c#", "algoritmo", "debug", "error", "fix",
                "implementa", "desarrolla", "refactoriza", "optimiza", "test", "api", "backend",
                "frontend", "database", "sql",
            ],
            &[
                r"\bcódigo\b",
                r"\bprograma(r|ción)?\b",
                r"\b(python|javascript|typescript|java|c\+\+|c#|rust|go)\b",
                r"\bfunción (que|para)\b",
                r"\balgoritmo\b",
                r"\bimplementa\b",
                r"\brefactoriza\b",
                r"\b(api|backend|frontend)\b",
            ],
        ),
        spec(
            "huggingface",
            "código_técnico",
            7,
            &[
                "código", "programa", "función", "clase", "script", "python", "javascript",
                "java", "c++", "algoritmo", "debug", "error", "fix", "implementa", "desarrolla",
            ],
            &[
                r"\bcódigo\b",
                r"\bprograma(r|ción)?\b",
                r"\b(python|javascript|java|c\+\+)\b",
                r"\bfunción (que|para)\b",
                r"\balgoritmo\b",
            ],
        ),
        spec(
            "deepseek",
            "matemáticas_lógica",
            8,
            &[
                "matemática", "cálculo", "ecuación", "fórmula", "resolver", "problema",
                "demostración", "teorema", "integral", "derivada", "estadística", "probabilidad",
                "álgebra", "geometría", "trigonometría",
            ],
            &[
                r"\bmatemática\b",
                r"\becuación\b",
                r"\bresolver\b",
                r"\bcalcul(ar|o)\b",
                r"\bdemostrar\b",
            ],
        ),
        spec(
            "mistral",
            "multilingüe_europeo",
            7,
            &[
                "traduce", "traducción", "francés", "alemán", "italiano", "español", "inglés",
                "idioma", "lenguaje", "europa", "europeo",
            ],
            &[
                r"\btraduc(e|ir|ción)\b",
                r"\b(francés|alemán|italiano|inglés)\b",
                r"\bidioma\b",
            ],
        ),
        spec(
            "ollama",
            "conversación_general",
            6,
            &["hola", "buen día", "cómo estás", "qué tal", "chau", "gracias", "ok", "entiendo", "bien"],
            &[
                r"\bhola\b",
                r"\bbuen(os)? día(s)?\b",
                r"\bcómo estás\b",
                r"\bqué tal\b",
                r"\bgracias\b",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pattern_compiles() {
        for row in builtin_specialties() {
            for pattern in &row.patterns {
                assert!(regex::Regex::new(pattern).is_ok(), "{}: {}", row.provider, pattern);
            }
        }
    }

    #[test]
    fn base_scores_in_range() {
        assert!(builtin_specialties().iter().all(|r| (1..=10).contains(&r.base_score)));
    }
}
