use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ProductEntry {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub description: String,
    pub myntra: Vec<ProductEntry>,
}

/// Success envelope returned by `/recommend/`.
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub status: String,
    pub message: String,
    pub data: Recommendation,
}

impl RecommendResponse {
    pub fn success(description: String, products: Vec<ProductEntry>) -> Self {
        let message = if products.is_empty() {
            "No products found on Myntra."
        } else {
            "Recommendations generated successfully."
        };
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Recommendation {
                description,
                myntra: products,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_results_are_still_a_success() {
        let body = serde_json::to_value(RecommendResponse::success("a hat".into(), vec![])).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "success",
                "message": "No products found on Myntra.",
                "data": {"description": "a hat", "myntra": []}
            })
        );
    }

    #[test]
    fn error_envelope_omits_missing_details() {
        let body = serde_json::to_value(ErrorResponse::new("Failed to analyze image: bad", None)).unwrap();
        assert_eq!(body, json!({"status": "error", "message": "Failed to analyze image: bad"}));

        let body = serde_json::to_value(ErrorResponse::new("Internal Server Error", Some("boom".into()))).unwrap();
        assert_eq!(body["details"], "boom");
    }
}
