//! Default scorecard: 23 variables across six categories with their band tables and
//! default weights. Weights are given as fractions and do not need to sum to exactly 1.0;
//! they are normalized before publication.

use super::domain::VariableId;
use super::registry::{
    CategoryScore, RegistryError, ScoreBand, ScoringStrategy, VariableDefinition,
    VariableScoringRegistry,
};

pub const CORE_CREDIT: &str = "Core Credit Variables";
pub const BEHAVIORAL: &str = "Behavioral Analytics";
pub const EMPLOYMENT: &str = "Employment Stability";
pub const BANKING: &str = "Banking Behavior";
pub const EXPOSURE: &str = "Exposure & Intent";
pub const GEOGRAPHIC: &str = "Geographic & Social";

/// Build the registry holding every default variable.
pub fn standard_registry() -> Result<VariableScoringRegistry, RegistryError> {
    VariableScoringRegistry::from_definitions(standard_definitions())
}

pub fn standard_definitions() -> Vec<VariableDefinition> {
    vec![
        // Core credit
        numeric(
            "credit_score",
            "Credit Score",
            CORE_CREDIT,
            0.107767,
            0.01,
            &[
                (-1.0, 0.01),
                (1.0, 0.2),
                (100.0, 0.0),
                (600.0, 0.3),
                (650.0, 0.6),
                (700.0, 0.8),
                (730.0, 0.9),
                (750.0, 1.0),
            ],
        ),
        numeric(
            "foir",
            "FOIR",
            CORE_CREDIT,
            0.065049,
            0.0,
            &[(0.0, 1.0), (0.36, 0.6), (0.46, 0.3), (0.56, 0.0)],
        ),
        numeric(
            "dpd30plus",
            "DPD30+",
            CORE_CREDIT,
            0.065049,
            0.0,
            &[(0.0, 1.0), (1.0, 0.5), (2.0, 0.0)],
        ),
        numeric(
            "enquiry_count",
            "Enquiry Count",
            CORE_CREDIT,
            0.056311,
            0.2,
            &[(0.0, 1.0), (2.0, 0.6), (4.0, 0.2)],
        ),
        upper_inclusive(
            numeric(
                "monthly_income",
                "Monthly Income",
                CORE_CREDIT,
                0.065049,
                0.0,
                &[
                    (0.0, 0.0),
                    (15_000.0, 0.3),
                    (18_000.0, 0.4),
                    (20_000.0, 0.6),
                    (30_000.0, 1.0),
                ],
            ),
            &[20_000.0],
        ),
        numeric(
            "age",
            "Age",
            CORE_CREDIT,
            0.03,
            0.0,
            &[
                (0.0, 0.0),
                (21.0, 0.6),
                (26.0, 1.0),
                (36.0, 0.8),
                (46.0, 0.6),
                (56.0, 0.4),
                (61.0, 0.0),
            ],
        ),
        // Behavioral
        numeric(
            "credit_vintage",
            "Credit Vintage (months)",
            BEHAVIORAL,
            0.033010,
            0.0,
            &[
                (0.0, 0.0),
                (7.0, 0.2),
                (13.0, 0.4),
                (25.0, 0.6),
                (37.0, 0.8),
                (61.0, 1.0),
            ],
        ),
        categorical(
            "loan_mix_type",
            "Loan Mix Type",
            BEHAVIORAL,
            0.021359,
            0.0,
            &[
                ("PL/HL/CC", 1.0),
                ("Gold + Consumer Durable", 0.6),
                ("Agri/Other loans", 0.4),
                ("Only Gold", 0.3),
            ],
        ),
        upper_inclusive(
            numeric(
                "loan_completion_ratio",
                "Loan Completion Ratio",
                BEHAVIORAL,
                0.025243,
                0.3,
                &[(0.0, 0.3), (0.4, 0.6), (0.7, 1.0)],
            ),
            &[0.4],
        ),
        numeric(
            "defaulted_loans",
            "Defaulted Loans",
            BEHAVIORAL,
            0.065049,
            0.0,
            &[(0.0, 1.0), (1.0, 0.0)],
        ),
        // Employment
        categorical(
            "job_type",
            "Job Type",
            EMPLOYMENT,
            0.021359,
            0.2,
            &[
                ("Government/PSU", 1.0),
                ("Private Company (MNC)", 0.9),
                ("Private Company (Local)", 0.7),
                ("Self Employed Professional", 0.6),
                ("Business Owner", 0.5),
                ("Freelancer/Contract", 0.3),
            ],
        ),
        numeric(
            "employment_tenure",
            "Employment Tenure (months)",
            EMPLOYMENT,
            0.043689,
            0.0,
            &[
                (0.0, 0.0),
                (6.0, 0.2),
                (12.0, 0.4),
                (24.0, 0.6),
                (36.0, 0.8),
                (60.0, 1.0),
            ],
        ),
        categorical(
            "company_stability",
            "Company Stability",
            EMPLOYMENT,
            0.012621,
            0.1,
            &[
                ("Fortune 500", 1.0),
                ("Large Enterprise", 0.9),
                ("Mid-size Company", 0.7),
                ("Small Company", 0.5),
                ("Startup", 0.3),
                ("Unknown", 0.1),
            ],
        ),
        // Banking
        numeric(
            "account_vintage",
            "Bank Account Vintage (months)",
            BANKING,
            0.029126,
            0.2,
            &[(0.0, 0.2), (12.0, 0.4), (24.0, 0.6), (36.0, 0.8), (60.0, 1.0)],
        ),
        numeric(
            "avg_monthly_balance",
            "Average Monthly Balance",
            BANKING,
            0.058252,
            0.0,
            &[
                (0.0, 0.0),
                (5_000.0, 0.2),
                (10_000.0, 0.4),
                (25_000.0, 0.6),
                (50_000.0, 0.8),
                (100_000.0, 1.0),
            ],
        ),
        numeric(
            "bounce_frequency",
            "Bounce Frequency (per year)",
            BANKING,
            0.042718,
            0.0,
            &[(0.0, 1.0), (1.0, 0.7), (3.0, 0.4), (6.0, 0.2), (11.0, 0.0)],
        ),
        // Exposure
        numeric(
            "unsecured_loan_amount",
            "Unsecured Loan Amount",
            EXPOSURE,
            0.065049,
            0.6,
            &[(0.0, 0.6), (1.0, 0.8), (50_000.0, 1.0), (100_001.0, 0.6)],
        ),
        upper_inclusive(
            numeric(
                "outstanding_amount_percent",
                "Outstanding Amount %",
                EXPOSURE,
                0.065049,
                0.3,
                &[(0.0, 1.0), (0.3, 0.6), (0.6, 0.3)],
            ),
            &[0.3],
        ),
        numeric(
            "our_lender_exposure",
            "Our Lender Exposure",
            EXPOSURE,
            0.065049,
            0.0,
            &[(0.0, 0.0), (1.0, 1.0)],
        ),
        categorical(
            "channel_type",
            "Channel Type",
            EXPOSURE,
            0.012621,
            0.5,
            &[("Merchant/Referral", 1.0)],
        ),
        // Geographic & social
        categorical(
            "geographic_risk",
            "Geographic Location Risk",
            GEOGRAPHIC,
            0.012621,
            0.5,
            &[
                ("Metro Tier 1", 1.0),
                ("Metro Tier 2", 0.8),
                ("Urban", 0.7),
                ("Semi-Urban", 0.5),
                ("Rural", 0.3),
                ("Remote", 0.1),
            ],
        ),
        numeric(
            "mobile_number_vintage",
            "Mobile Number Vintage (months)",
            GEOGRAPHIC,
            0.033981,
            0.2,
            &[(0.0, 0.2), (12.0, 0.4), (24.0, 0.6), (36.0, 0.8), (60.0, 1.0)],
        ),
        numeric(
            "digital_engagement",
            "Digital Engagement Score",
            GEOGRAPHIC,
            0.033981,
            0.2,
            &[(0.0, 0.2), (20.0, 0.4), (40.0, 0.6), (60.0, 0.8), (80.0, 1.0)],
        ),
    ]
}

/// Variables whose table-store id differs from the registry id.
pub const TABLE_ID_RENAMES: &[(&str, &str)] = &[
    ("credit_vintage", "credit_vintage_months"),
    ("employment_tenure", "employment_tenure_months"),
    ("account_vintage", "bank_account_vintage_months"),
    ("bounce_frequency", "bounce_frequency_per_year"),
    ("geographic_risk", "geographic_location_risk"),
    ("mobile_number_vintage", "mobile_vintage_months"),
    ("digital_engagement", "digital_engagement_score"),
];

/// Contiguous bands from `(lower_bound, score)` steps; the last band is unbounded above.
fn steps(thresholds: &[(f64, f64)]) -> Vec<ScoreBand> {
    thresholds
        .iter()
        .enumerate()
        .map(|(index, (min, score))| {
            let max = thresholds.get(index + 1).map(|(next, _)| *next);
            ScoreBand::new(Some(*min), max, *score)
        })
        .collect()
}

fn numeric(
    id: &str,
    display_name: &str,
    category: &str,
    weight: f64,
    fallback_score: f64,
    thresholds: &[(f64, f64)],
) -> VariableDefinition {
    VariableDefinition {
        id: VariableId::from(id),
        display_name: display_name.to_string(),
        category: category.to_string(),
        weight,
        fallback_score,
        strategy: ScoringStrategy::Numeric {
            bands: steps(thresholds),
        },
    }
}

/// Close the upper edge of the bands starting at `lower_bounds`.
fn upper_inclusive(
    mut definition: VariableDefinition,
    lower_bounds: &[f64],
) -> VariableDefinition {
    if let ScoringStrategy::Numeric { bands } = &mut definition.strategy {
        for band in bands.iter_mut() {
            if band.min.map_or(false, |min| lower_bounds.contains(&min)) {
                band.upper_inclusive = true;
            }
        }
    }
    definition
}

fn categorical(
    id: &str,
    display_name: &str,
    category: &str,
    weight: f64,
    fallback_score: f64,
    categories: &[(&str, f64)],
) -> VariableDefinition {
    VariableDefinition {
        id: VariableId::from(id),
        display_name: display_name.to_string(),
        category: category.to_string(),
        weight,
        fallback_score,
        strategy: ScoringStrategy::Categorical {
            categories: categories
                .iter()
                .map(|(value, score)| CategoryScore::new(*value, *score))
                .collect(),
        },
    }
}
