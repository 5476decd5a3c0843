use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use facade_core::Result;
use facade_vcs::RangeQuery;

/// Query parameter identificando un repositorio.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryParams {
    pub ssh_url: String,
}

/// Un rango de commits sobre un repositorio.
///
/// `fromId` y `fromDate` son mutuamente excluyentes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeParams {
    pub ssh_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    pub to_id: String,
}

impl RangeParams {
    /// Convierte a query del resolver, validando los limites.
    ///
    /// # Errors
    ///
    /// `FacadeError::ArgumentsNotCompatible` si vienen `fromId` y `fromDate`.
    pub fn range_query(&self) -> Result<RangeQuery> {
        let query = RangeQuery {
            from_ref: self.from_id.clone(),
            from_date: self.from_date,
            to_ref: self.to_id.clone(),
        };
        query.start()?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_params_from_query_string() {
        let params: RangeParams = serde_json::from_value(serde_json::json!({
            "sshUrl": "ssh://git@gitea.example.com/team/service.git",
            "fromId": "v1.0",
            "toId": "main"
        }))
        .unwrap();

        let query = params.range_query().unwrap();
        assert_eq!(query.from_ref.as_deref(), Some("v1.0"));
        assert_eq!(query.to_ref, "main");
    }

    #[test]
    fn test_both_bounds_are_rejected() {
        let params = RangeParams {
            ssh_url: "ssh://git@gitea.example.com/team/service.git".to_string(),
            from_id: Some("v1.0".to_string()),
            from_date: Some(Utc::now()),
            to_id: "main".to_string(),
        };
        assert!(matches!(
            params.range_query(),
            Err(facade_core::FacadeError::ArgumentsNotCompatible(_))
        ));
    }
}
