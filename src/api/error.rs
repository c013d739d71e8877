//! Tipos de erro para o cliente da API do backend Alicit.
//!
//! A classificação das respostas HTTP acontece uma única vez, aqui na
//! fronteira: o restante da crate trabalha com as variantes de
//! [`ApiError`], nunca com status HTTP crus.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Machine-readable code sent with 409 when the analysis result exists.
pub const CODE_ALREADY_EXISTS: &str = "ANALYSIS_ALREADY_EXISTS";
/// Machine-readable code sent with 423 while another actor is processing.
pub const CODE_IN_PROGRESS: &str = "ANALYSIS_IN_PROGRESS";

const GENERIC_MESSAGE: &str = "Erro na requisição";
const TOKEN_ERRORS: [&str; 3] = ["Token não fornecido", "Token inválido", "Sessão expirada"];

/// Erros que podem ocorrer ao falar com o backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 409 com código `ANALYSIS_ALREADY_EXISTS`: o resultado já existe.
    #[error("análise já existe")]
    AlreadyExists,

    /// HTTP 423 com código `ANALYSIS_IN_PROGRESS`: outro ator está processando.
    #[error("análise em andamento em outra sessão")]
    InProgress,

    /// HTTP 401 causado por token ausente, inválido ou expirado.
    #[error("Sessão expirada")]
    SessionExpired,

    /// Qualquer outra resposta não-2xx.
    #[error("{message}")]
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("erro de rede: {0}")]
    Network(#[from] reqwest::Error),

    /// Corpo 2xx que não corresponde ao formato esperado.
    #[error("resposta inválida: {0}")]
    Decode(String),
}

/// JSON error body returned by the backend.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

fn matches_code(code: Option<&str>, canonical: &str) -> bool {
    let Some(code) = code else { return false };
    code == canonical || canonical.strip_prefix("ANALYSIS_") == Some(code)
}

impl ApiError {
    /// Map a non-success status and its (possibly empty) body to an error.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let code = parsed.code.as_deref();

        match status {
            StatusCode::CONFLICT if matches_code(code, CODE_ALREADY_EXISTS) => {
                ApiError::AlreadyExists
            }
            StatusCode::LOCKED if matches_code(code, CODE_IN_PROGRESS) => ApiError::InProgress,
            StatusCode::UNAUTHORIZED
                if parsed
                    .error
                    .as_deref()
                    .is_some_and(|e| TOKEN_ERRORS.contains(&e)) =>
            {
                ApiError::SessionExpired
            }
            _ => ApiError::Http {
                status: status.as_u16(),
                code: parsed.code,
                message: parsed
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| GENERIC_MESSAGE.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_with_code_is_already_exists() {
        let err = ApiError::from_response(
            StatusCode::CONFLICT,
            r#"{"error":"Análise já existe","code":"ANALYSIS_ALREADY_EXISTS"}"#,
        );
        assert!(matches!(err, ApiError::AlreadyExists));

        let short = ApiError::from_response(StatusCode::CONFLICT, r#"{"code":"ALREADY_EXISTS"}"#);
        assert!(matches!(short, ApiError::AlreadyExists));
    }

    #[test]
    fn conflict_without_code_stays_generic() {
        let err = ApiError::from_response(StatusCode::CONFLICT, r#"{"error":"duplicado"}"#);
        match err {
            ApiError::Http { status, message, .. } => {
                assert_eq!(status, 409);
                assert_eq!(message, "duplicado");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn locked_with_code_is_in_progress() {
        let err = ApiError::from_response(
            StatusCode::LOCKED,
            r#"{"error":"ocupado","code":"ANALYSIS_IN_PROGRESS"}"#,
        );
        assert!(matches!(err, ApiError::InProgress));
    }

    #[test]
    fn token_errors_are_session_expired() {
        let err =
            ApiError::from_response(StatusCode::UNAUTHORIZED, r#"{"error":"Token inválido"}"#);
        assert!(matches!(err, ApiError::SessionExpired));

        let other =
            ApiError::from_response(StatusCode::UNAUTHORIZED, r#"{"error":"Sem permissão"}"#);
        assert_eq!(other.to_string(), "Sem permissão");
    }

    #[test]
    fn unparseable_body_uses_generic_message() {
        let err = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.to_string(), "Erro na requisição");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
