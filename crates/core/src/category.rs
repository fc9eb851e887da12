//! Fixed category taxonomy for the regulatory corpus.
//!
//! The corpus is organized into twelve closed categories plus an
//! `uncategorized` fallback. The set is part of the artifact contract:
//! category ids appear verbatim in every persisted file, so consumers must
//! tolerate the fallback id but never invent new ones.

use serde::{Deserialize, Serialize};

use crate::types::Language;

/// One of the twelve corpus categories, or the fallback.
///
/// Unknown ids deserialize to [`CategoryId::Uncategorized`] so that older
/// runtimes keep working if the taxonomy ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    GeneralOperations,
    AntiCorruption,
    AcademicCouncil,
    StructuralDivisions,
    EducationalProcess,
    ScientificWork,
    FinancialActivities,
    InformationActivities,
    SocialCivic,
    Dormitories,
    HrManagement,
    Safety,
    #[serde(other)]
    Uncategorized,
}

/// The twelve real categories in index-page order. Heading assignment in the
/// fetcher cycles through this list; the fallback is intentionally absent.
pub const CATEGORY_ORDER: [CategoryId; 12] = [
    CategoryId::GeneralOperations,
    CategoryId::AntiCorruption,
    CategoryId::AcademicCouncil,
    CategoryId::StructuralDivisions,
    CategoryId::EducationalProcess,
    CategoryId::ScientificWork,
    CategoryId::FinancialActivities,
    CategoryId::InformationActivities,
    CategoryId::SocialCivic,
    CategoryId::Dormitories,
    CategoryId::HrManagement,
    CategoryId::Safety,
];

impl CategoryId {
    /// Stable string id used in artifacts and file paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "general_operations",
            CategoryId::AntiCorruption => "anti_corruption",
            CategoryId::AcademicCouncil => "academic_council",
            CategoryId::StructuralDivisions => "structural_divisions",
            CategoryId::EducationalProcess => "educational_process",
            CategoryId::ScientificWork => "scientific_work",
            CategoryId::FinancialActivities => "financial_activities",
            CategoryId::InformationActivities => "information_activities",
            CategoryId::SocialCivic => "social_civic",
            CategoryId::Dormitories => "dormitories",
            CategoryId::HrManagement => "hr_management",
            CategoryId::Safety => "safety",
            CategoryId::Uncategorized => "uncategorized",
        }
    }

    /// Parse a string id; unknown ids map to the fallback.
    pub fn parse(id: &str) -> CategoryId {
        CATEGORY_ORDER
            .iter()
            .copied()
            .find(|c| c.as_str() == id)
            .unwrap_or(CategoryId::Uncategorized)
    }

    pub fn name_uk(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "Загальна діяльність",
            CategoryId::AntiCorruption => "Антикорупційна діяльність",
            CategoryId::AcademicCouncil => "Вчена рада",
            CategoryId::StructuralDivisions => "Структурні підрозділи",
            CategoryId::EducationalProcess => "Освітній процес",
            CategoryId::ScientificWork => "Наукова робота",
            CategoryId::FinancialActivities => "Фінансова діяльність",
            CategoryId::InformationActivities => "Інформаційна діяльність",
            CategoryId::SocialCivic => "Соціальна та громадська діяльність",
            CategoryId::Dormitories => "Гуртожитки",
            CategoryId::HrManagement => "Кадрове забезпечення",
            CategoryId::Safety => "Безпека",
            CategoryId::Uncategorized => "Без категорії",
        }
    }

    pub fn name_en(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "General Operations",
            CategoryId::AntiCorruption => "Anti-Corruption",
            CategoryId::AcademicCouncil => "Academic Council",
            CategoryId::StructuralDivisions => "Structural Divisions",
            CategoryId::EducationalProcess => "Educational Process",
            CategoryId::ScientificWork => "Scientific Work",
            CategoryId::FinancialActivities => "Financial Activities",
            CategoryId::InformationActivities => "Information Activities",
            CategoryId::SocialCivic => "Social and Civic Activities",
            CategoryId::Dormitories => "Dormitories",
            CategoryId::HrManagement => "HR Management",
            CategoryId::Safety => "Safety",
            CategoryId::Uncategorized => "Uncategorized",
        }
    }

    /// Emoji icon shown next to the category in the UI layer.
    pub fn icon(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "🏛️",
            CategoryId::AntiCorruption => "⚖️",
            CategoryId::AcademicCouncil => "🎓",
            CategoryId::StructuralDivisions => "🏢",
            CategoryId::EducationalProcess => "📚",
            CategoryId::ScientificWork => "🔬",
            CategoryId::FinancialActivities => "💰",
            CategoryId::InformationActivities => "📰",
            CategoryId::SocialCivic => "🤝",
            CategoryId::Dormitories => "🏠",
            CategoryId::HrManagement => "👥",
            CategoryId::Safety => "🛡️",
            CategoryId::Uncategorized => "📄",
        }
    }

    pub fn description_uk(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "Статут, стратегія та загальні положення університету",
            CategoryId::AntiCorruption => "Антикорупційна програма та доброчесність",
            CategoryId::AcademicCouncil => "Положення та рішення вченої ради",
            CategoryId::StructuralDivisions => "Положення про факультети, кафедри та відділи",
            CategoryId::EducationalProcess => "Організація навчання та атестація здобувачів",
            CategoryId::ScientificWork => "Наукова та дослідницька діяльність",
            CategoryId::FinancialActivities => "Фінансове планування та закупівлі",
            CategoryId::InformationActivities => "Інформаційна політика та видавнича діяльність",
            CategoryId::SocialCivic => "Студентське самоврядування та соціальна підтримка",
            CategoryId::Dormitories => "Правила проживання в гуртожитках",
            CategoryId::HrManagement => "Кадрові питання та конкурси на посади",
            CategoryId::Safety => "Охорона праці та безпека життєдіяльності",
            CategoryId::Uncategorized => "Документи без визначеної категорії",
        }
    }

    pub fn description_en(&self) -> &'static str {
        match self {
            CategoryId::GeneralOperations => "University charter, strategy and general regulations",
            CategoryId::AntiCorruption => "Anti-corruption program and integrity",
            CategoryId::AcademicCouncil => "Academic council regulations and decisions",
            CategoryId::StructuralDivisions => "Regulations of faculties, departments and units",
            CategoryId::EducationalProcess => "Study organization and student assessment",
            CategoryId::ScientificWork => "Scientific and research activities",
            CategoryId::FinancialActivities => "Financial planning and procurement",
            CategoryId::InformationActivities => "Information policy and publishing",
            CategoryId::SocialCivic => "Student self-government and social support",
            CategoryId::Dormitories => "Dormitory residence rules",
            CategoryId::HrManagement => "Staffing and position competitions",
            CategoryId::Safety => "Occupational and life safety",
            CategoryId::Uncategorized => "Documents without an assigned category",
        }
    }

    /// Localized display name.
    pub fn name(&self, language: Language) -> &'static str {
        match language {
            Language::Uk => self.name_uk(),
            Language::En => self.name_en(),
        }
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        CategoryId::Uncategorized
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twelve_categories() {
        assert_eq!(CATEGORY_ORDER.len(), 12);
        assert!(!CATEGORY_ORDER.contains(&CategoryId::Uncategorized));
    }

    #[test]
    fn test_id_roundtrip() {
        for category in CATEGORY_ORDER {
            assert_eq!(CategoryId::parse(category.as_str()), category);
        }
    }

    #[test]
    fn test_unknown_id_falls_back() {
        assert_eq!(CategoryId::parse("sports"), CategoryId::Uncategorized);
        assert_eq!(CategoryId::parse(""), CategoryId::Uncategorized);
    }

    #[test]
    fn test_serde_uses_snake_case_ids() {
        let json = serde_json::to_string(&CategoryId::HrManagement).unwrap();
        assert_eq!(json, "\"hr_management\"");

        let parsed: CategoryId = serde_json::from_str("\"dormitories\"").unwrap();
        assert_eq!(parsed, CategoryId::Dormitories);
    }

    #[test]
    fn test_unknown_id_deserializes_to_fallback() {
        let parsed: CategoryId = serde_json::from_str("\"brand_new_category\"").unwrap();
        assert_eq!(parsed, CategoryId::Uncategorized);
    }

    #[test]
    fn test_localized_names() {
        assert_eq!(CategoryId::Safety.name(Language::En), "Safety");
        assert_eq!(CategoryId::Safety.name(Language::Uk), "Безпека");
    }
}
