use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

// ---------------------------------------------------------------------------
// Factor codes
// ---------------------------------------------------------------------------

/// Fixed business identifiers for survey factors.
pub mod factor_codes {
    pub const LAND_AREA: &str = "05";
    pub const USABLE_AREA: &str = "12";
    pub const OFFERING_PRICE: &str = "17";
    pub const MEASUREMENT_UNIT: &str = "20";
    pub const SELLING_PRICE: &str = "21";
    pub const SELLING_DATE: &str = "22";
}

// ---------------------------------------------------------------------------
// Survey (comparable)
// ---------------------------------------------------------------------------

/// One factor of a market survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyFactor {
    #[serde(alias = "id")]
    pub code: String,
    #[serde(default)]
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal_places: Option<u8>,
}

/// A comparable market transaction or listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: String,
    #[serde(default)]
    pub factors: Vec<SurveyFactor>,
}

impl Survey {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            factors: Vec::new(),
        }
    }

    /// Builder helper for tests and fixtures.
    pub fn with_factor(mut self, code: &str, value: impl Into<FieldValue>) -> Self {
        self.factors.push(SurveyFactor {
            code: code.to_string(),
            value: value.into(),
            data_type: None,
            decimal_places: None,
        });
        self
    }

    /// Raw value of the factor with `code`; `Empty` when absent.
    pub fn factor(&self, code: &str) -> FieldValue {
        self.factors
            .iter()
            .find(|f| f.code == code)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }

    /// Selling date (factor `22`), accepting `YYYY-MM-DD` with an optional time part.
    pub fn selling_date(&self) -> Option<NaiveDate> {
        match self.factor(factor_codes::SELLING_DATE) {
            FieldValue::Text(s) => parse_date(&s),
            _ => None,
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFactor {
    pub factor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
}

impl TemplateFactor {
    pub fn new(factor_id: &str) -> Self {
        Self {
            factor_id: factor_id.to_string(),
            weight: None,
            intensity: None,
        }
    }

    pub fn weighted(factor_id: &str, weight: f64, intensity: f64) -> Self {
        Self {
            factor_id: factor_id.to_string(),
            weight: Some(weight),
            intensity: Some(intensity),
        }
    }
}

/// Predefined factor lists seeding a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template_code: String,
    pub collateral_type_id: String,
    #[serde(default)]
    pub calculation_factors: Vec<TemplateFactor>,
    #[serde(default)]
    pub comparative_factors: Vec<TemplateFactor>,
    #[serde(default)]
    pub qualitative_factors: Vec<TemplateFactor>,
}

// ---------------------------------------------------------------------------
// Subject property
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollateralType {
    #[default]
    #[serde(rename = "L")]
    Land,
    #[serde(rename = "B")]
    Building,
    #[serde(rename = "LB")]
    LandAndBuilding,
    #[serde(rename = "C")]
    Condominium,
}

impl std::fmt::Display for CollateralType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Land => write!(f, "L"),
            Self::Building => write!(f, "B"),
            Self::LandAndBuilding => write!(f, "LB"),
            Self::Condominium => write!(f, "C"),
        }
    }
}

/// The collateral being appraised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub collateral_type: CollateralType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usable_area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appraisal_date: Option<NaiveDate>,
    /// Other subject attributes carried through untouched.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Property {
    pub fn new(collateral_type: CollateralType) -> Self {
        Self {
            collateral_type,
            ..Self::default()
        }
    }

    pub fn is_land(&self) -> bool {
        self.collateral_type == CollateralType::Land
    }
}

/// Whole years between a survey's selling date and the appraisal date.
pub fn years_since_sale(survey: &Survey, property: &Property) -> Option<u32> {
    let sold = survey.selling_date()?;
    property.appraisal_date?.years_since(sold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_accepts_external_shape() {
        let json = r#"{
            "id": "S-1",
            "factors": [
                {"id": "17", "value": 22750},
                {"code": "22", "value": "2021-03-15T00:00:00Z", "dataType": "date"},
                {"id": "20", "value": null}
            ]
        }"#;
        let survey: Survey = serde_json::from_str(json).unwrap();
        assert_eq!(survey.factor(factor_codes::OFFERING_PRICE), FieldValue::Number(22750.0));
        assert_eq!(survey.factor(factor_codes::MEASUREMENT_UNIT), FieldValue::Empty);
        assert_eq!(survey.factor("99"), FieldValue::Empty);
        assert_eq!(survey.selling_date(), NaiveDate::from_ymd_opt(2021, 3, 15));
        assert_eq!(survey.factors[1].data_type.as_deref(), Some("date"));
    }

    #[test]
    fn test_template_and_property_shapes() {
        let template: Template = serde_json::from_str(
            r#"{
                "templateCode": "T-LAND",
                "collateralTypeId": "L",
                "qualitativeFactors": [{"factorId": "01", "weight": 0.3, "intensity": 8}]
            }"#,
        )
        .unwrap();
        assert_eq!(template.qualitative_factors[0].weight, Some(0.3));
        assert!(template.comparative_factors.is_empty());

        let property: Property = serde_json::from_str(
            r#"{"collateralType": "LB", "landArea": 100, "appraisalDate": "2024-06-30", "province": "10"}"#,
        )
        .unwrap();
        assert_eq!(property.collateral_type, CollateralType::LandAndBuilding);
        assert_eq!(property.land_area, Some(100.0));
        assert_eq!(property.extra["province"], "10");
        assert!(!property.is_land());
    }

    #[test]
    fn test_years_since_sale() {
        let survey = Survey::new("S").with_factor(factor_codes::SELLING_DATE, "2021-07-01");
        let mut property = Property::new(CollateralType::Land);
        assert_eq!(years_since_sale(&survey, &property), None);

        property.appraisal_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        assert_eq!(years_since_sale(&survey, &property), Some(2));

        property.appraisal_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert_eq!(years_since_sale(&survey, &property), None);
    }
}
