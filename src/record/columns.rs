//! QMetry import columns
//!
//! The 32 columns of the QMetry test case import template. Order and header
//! text are fixed; downstream importers depend on both.

/// Number of columns in every record
pub const COLUMN_COUNT: usize = 32;

/// One column of the QMetry import template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    IssueKey,
    Summary,
    Description,
    Precondition,
    Status,
    Priority,
    Assignee,
    Reporter,
    EstimatedTime,
    Labels,
    Components,
    Sprint,
    FixVersions,
    StepSummary,
    TestData,
    ExpectedResult,
    Folders,
    StoryLinkages,
    Apps,
    ComponentFeature,
    CtUpdateTarget,
    EvidenceType,
    LiveProposition,
    Platform,
    RegressionType,
    UsersApplied,
    Automatable,
    AutomatedProposition,
    HighVisibility,
    IsAds,
    NbaFeature,
    TcRequiresUseOfProxy,
}

impl Column {
    /// Every column in template order
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::IssueKey,
        Column::Summary,
        Column::Description,
        Column::Precondition,
        Column::Status,
        Column::Priority,
        Column::Assignee,
        Column::Reporter,
        Column::EstimatedTime,
        Column::Labels,
        Column::Components,
        Column::Sprint,
        Column::FixVersions,
        Column::StepSummary,
        Column::TestData,
        Column::ExpectedResult,
        Column::Folders,
        Column::StoryLinkages,
        Column::Apps,
        Column::ComponentFeature,
        Column::CtUpdateTarget,
        Column::EvidenceType,
        Column::LiveProposition,
        Column::Platform,
        Column::RegressionType,
        Column::UsersApplied,
        Column::Automatable,
        Column::AutomatedProposition,
        Column::HighVisibility,
        Column::IsAds,
        Column::NbaFeature,
        Column::TcRequiresUseOfProxy,
    ];

    /// Columns that are QMetry custom fields, addressed by field ID on upload
    pub const CUSTOM_FIELDS: [Column; 14] = [
        Column::Apps,
        Column::ComponentFeature,
        Column::CtUpdateTarget,
        Column::EvidenceType,
        Column::LiveProposition,
        Column::Platform,
        Column::RegressionType,
        Column::UsersApplied,
        Column::Automatable,
        Column::AutomatedProposition,
        Column::HighVisibility,
        Column::IsAds,
        Column::NbaFeature,
        Column::TcRequiresUseOfProxy,
    ];

    /// Zero-based position in the row
    pub fn index(self) -> usize {
        self as usize
    }

    /// Header text, byte-for-byte as in the import template
    pub fn header(self) -> &'static str {
        match self {
            Column::IssueKey => "Issue Key",
            Column::Summary => "Summary",
            Column::Description => "Description",
            Column::Precondition => "Precondition",
            Column::Status => "Status",
            Column::Priority => "Priority",
            Column::Assignee => "Assignee",
            Column::Reporter => "Reporter",
            Column::EstimatedTime => "Estimated Time",
            Column::Labels => "Labels",
            Column::Components => "Components",
            Column::Sprint => "Sprint",
            Column::FixVersions => "Fix Versions",
            Column::StepSummary => "Step Summary",
            Column::TestData => "Test Data",
            Column::ExpectedResult => "Expected Result",
            Column::Folders => "Folders",
            Column::StoryLinkages => "Story Linkages",
            Column::Apps => "Apps",
            Column::ComponentFeature => "Component/Feature",
            Column::CtUpdateTarget => "CT Update Target",
            Column::EvidenceType => "Evidence Type",
            Column::LiveProposition => "Live Proposition",
            Column::Platform => "Platform",
            Column::RegressionType => "Regression Type",
            Column::UsersApplied => "Users Applied",
            Column::Automatable => "Automatable?",
            Column::AutomatedProposition => "Automated Proposition",
            Column::HighVisibility => "HighVisibility",
            Column::IsAds => "IsAds?",
            Column::NbaFeature => "NBA Feature",
            Column::TcRequiresUseOfProxy => "TC requires use of proxy",
        }
    }

    pub fn is_custom_field(self) -> bool {
        self >= Column::Apps
    }
}

/// Header row in template order
pub fn header_row() -> [&'static str; COLUMN_COUNT] {
    Column::ALL.map(Column::header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_columns_in_index_order() {
        for (i, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
    }

    #[test]
    fn test_header_row() {
        let header = header_row();
        assert_eq!(header.len(), 32);
        assert_eq!(header[0], "Issue Key");
        assert_eq!(header[13], "Step Summary");
        assert_eq!(header[31], "TC requires use of proxy");
    }

    #[test]
    fn test_custom_fields_are_the_tail() {
        assert_eq!(Column::CUSTOM_FIELDS.len(), 14);
        assert!(Column::CUSTOM_FIELDS.iter().all(|c| c.is_custom_field()));
        assert!(!Column::StoryLinkages.is_custom_field());
        assert_eq!(Column::CUSTOM_FIELDS[0].index(), 18);
    }
}
