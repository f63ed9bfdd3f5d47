//! Lead-generation parameters and the values each one accepts.
//!
//! The table mirrors the filters available in LinkedIn Sales Navigator. It is
//! rendered into the extractor's instructions and used to canonicalize the
//! values the model returns.

use std::fmt;
use std::str::FromStr;

/// A lead-generation parameter collected during the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeadField {
    Industry,
    Location,
    CompanySize,
    SeniorityLevel,
    JobFunction,
    YearsOfExperience,
    LinkedInConnections,
    SharedExperiences,
    RecentActivity,
}

impl LeadField {
    /// Every field, in the order the conversation usually covers them.
    pub const ALL: [LeadField; 9] = [
        LeadField::Industry,
        LeadField::Location,
        LeadField::CompanySize,
        LeadField::SeniorityLevel,
        LeadField::JobFunction,
        LeadField::YearsOfExperience,
        LeadField::LinkedInConnections,
        LeadField::SharedExperiences,
        LeadField::RecentActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "Industry",
            Self::Location => "Location",
            Self::CompanySize => "CompanySize",
            Self::SeniorityLevel => "SeniorityLevel",
            Self::JobFunction => "JobFunction",
            Self::YearsOfExperience => "YearsOfExperience",
            Self::LinkedInConnections => "LinkedInConnections",
            Self::SharedExperiences => "SharedExperiences",
            Self::RecentActivity => "RecentActivity",
        }
    }

    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            Self::Industry => &[
                "Technology",
                "Finance",
                "Healthcare",
                "Education",
                "Manufacturing",
                "Retail",
                "Real Estate",
                "Marketing & Advertising",
                "Consulting",
                "Legal",
                "Energy",
                "Media & Entertainment",
                "Transportation & Logistics",
                "Government",
                "Non-profit",
            ],
            Self::Location => &[
                "North America",
                "Latin America",
                "Europe",
                "Middle East",
                "Africa",
                "Asia Pacific",
            ],
            Self::CompanySize => &[
                "Self-employed",
                "1-10 employees",
                "11-50 employees",
                "51-200 employees",
                "201-500 employees",
                "501-1,000 employees",
                "1,001-5,000 employees",
                "5,001-10,000 employees",
                "10,001+ employees",
            ],
            Self::SeniorityLevel => &[
                "Owner / Partner",
                "CXO",
                "Vice President",
                "Director",
                "Experienced Manager",
                "Entry Level Manager",
                "Strategic",
                "Senior",
                "Entry Level",
                "In Training",
            ],
            Self::JobFunction => &[
                "Accounting",
                "Administrative",
                "Business Development",
                "Consulting",
                "Customer Success and Support",
                "Education",
                "Engineering",
                "Finance",
                "Human Resources",
                "Information Technology",
                "Legal",
                "Marketing",
                "Operations",
                "Product Management",
                "Program and Project Management",
                "Purchasing",
                "Research",
                "Sales",
            ],
            Self::YearsOfExperience => &[
                "Less than 1 year",
                "1 to 2 years",
                "3 to 5 years",
                "6 to 10 years",
                "More than 10 years",
            ],
            Self::LinkedInConnections => &[
                "1st degree",
                "2nd degree",
                "3rd degree and beyond",
            ],
            Self::SharedExperiences => &[
                "Past colleague",
                "Shared school",
                "Shared groups",
                "Shared events",
            ],
            Self::RecentActivity => &[
                "Changed jobs in last 90 days",
                "Posted on LinkedIn in last 30 days",
                "Mentioned in the news in last 30 days",
                "Following your company",
                "Viewed your profile recently",
            ],
        }
    }

    /// Map a model-supplied value onto the canonical spelling in the table.
    ///
    /// Comparison ignores case, whitespace and punctuation other than `+`,
    /// so "201 - 500 Employees" resolves to "201-500 employees".
    pub fn normalize(&self, value: &str) -> Option<&'static str> {
        let wanted = comparison_key(value);
        if wanted.is_empty() {
            return None;
        }
        self.allowed_values()
            .iter()
            .copied()
            .find(|allowed| comparison_key(allowed) == wanted)
    }
}

impl fmt::Display for LeadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadField {
    type Err = String;

    /// Accepts `CompanySize`, `company_size`, `Company Size` and similar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = comparison_key(s);
        Self::ALL
            .iter()
            .copied()
            .find(|field| comparison_key(field.as_str()) == key)
            .ok_or_else(|| format!("unknown lead field '{s}'"))
    }
}

fn comparison_key(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || *c == '+')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Render the table as a bullet list for the system prompt.
pub fn describe() -> String {
    LeadField::ALL
        .iter()
        .map(|field| format!("- {}: {}", field, field.allowed_values().join("; ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_parse_loosely() {
        assert_eq!("Industry".parse::<LeadField>().unwrap(), LeadField::Industry);
        assert_eq!("company_size".parse::<LeadField>().unwrap(), LeadField::CompanySize);
        assert_eq!(
            "LinkedIn Connections".parse::<LeadField>().unwrap(),
            LeadField::LinkedInConnections
        );
        assert!("Budget".parse::<LeadField>().is_err());
        assert!("".parse::<LeadField>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for field in LeadField::ALL {
            assert_eq!(field.to_string().parse::<LeadField>().unwrap(), field);
        }
    }

    #[test]
    fn normalize_returns_canonical_spelling() {
        assert_eq!(
            LeadField::CompanySize.normalize("201 - 500 Employees"),
            Some("201-500 employees")
        );
        assert_eq!(
            LeadField::CompanySize.normalize("10001+ employees"),
            Some("10,001+ employees")
        );
        assert_eq!(LeadField::Industry.normalize("technology"), Some("Technology"));
        assert_eq!(LeadField::SeniorityLevel.normalize("cxo"), Some("CXO"));
    }

    #[test]
    fn normalize_rejects_values_outside_the_table() {
        assert_eq!(LeadField::Industry.normalize("Space Piracy"), None);
        assert_eq!(LeadField::Location.normalize(""), None);
        assert_eq!(LeadField::CompanySize.normalize("about 500"), None);
    }

    #[test]
    fn company_size_keys_are_distinct() {
        let keys: std::collections::HashSet<String> = LeadField::CompanySize
            .allowed_values()
            .iter()
            .map(|v| comparison_key(v))
            .collect();
        assert_eq!(keys.len(), LeadField::CompanySize.allowed_values().len());
    }

    #[test]
    fn describe_lists_every_field() {
        let text = describe();
        for field in LeadField::ALL {
            assert!(text.contains(field.as_str()), "missing {field}");
        }
        assert!(text.contains("201-500 employees"));
    }
}
