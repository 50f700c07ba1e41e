use crate::db::models::SubjectResult;
use crate::db::types::PassStatus;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradeBand {
    pub(crate) min_percentage: f64,
    pub(crate) grade: String,
}

/// Percentage bands, highest threshold first. Anything below the last band
/// receives the fallback grade.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradingScale {
    bands: Vec<GradeBand>,
    fallback: String,
}

impl Default for GradingScale {
    fn default() -> Self {
        let bands = [(90.0, "A+"), (80.0, "A"), (70.0, "B+"), (60.0, "B"), (50.0, "C"), (33.0, "D")]
            .into_iter()
            .map(|(min_percentage, grade)| GradeBand { min_percentage, grade: grade.to_string() })
            .collect();
        Self { bands, fallback: "F".to_string() }
    }
}

impl GradingScale {
    /// Parses `90:A+,80:A,...`; an entry `*:X` replaces the fallback grade.
    pub(crate) fn parse(raw: &str) -> Result<Self, String> {
        let mut bands = Vec::new();
        let mut fallback = "F".to_string();

        for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (threshold, grade) = item
                .split_once(':')
                .ok_or_else(|| format!("expected threshold:grade in '{item}'"))?;
            let grade = grade.trim();
            if grade.is_empty() {
                return Err(format!("missing grade in '{item}'"));
            }

            if threshold.trim() == "*" {
                fallback = grade.to_string();
                continue;
            }

            let min_percentage: f64 =
                threshold.trim().parse().map_err(|_| format!("invalid threshold in '{item}'"))?;
            if !(0.0..=100.0).contains(&min_percentage) {
                return Err(format!("threshold out of range in '{item}'"));
            }
            if bands.iter().any(|band: &GradeBand| band.min_percentage == min_percentage) {
                return Err(format!("duplicate threshold in '{item}'"));
            }
            bands.push(GradeBand { min_percentage, grade: grade.to_string() });
        }

        if bands.is_empty() {
            return Err("at least one grade band is required".to_string());
        }

        bands.sort_by(|left, right| right.min_percentage.total_cmp(&left.min_percentage));
        Ok(Self { bands, fallback })
    }

    pub(crate) fn grade_for(&self, percentage: f64) -> &str {
        self.bands
            .iter()
            .find(|band| percentage >= band.min_percentage)
            .map(|band| band.grade.as_str())
            .unwrap_or(&self.fallback)
    }
}

/// Marks for one subject with its marks configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MarkEntry {
    pub(crate) subject_name: String,
    pub(crate) marks_obtained: f64,
    pub(crate) max_marks: f64,
    pub(crate) passing_marks: f64,
    pub(crate) graded_by: Option<String>,
}

impl From<&SubjectResult> for MarkEntry {
    fn from(result: &SubjectResult) -> Self {
        Self {
            subject_name: result.subject_name.clone(),
            marks_obtained: result.marks_obtained,
            max_marks: result.max_marks,
            passing_marks: result.passing_marks,
            graded_by: result.graded_by.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScoredResult {
    pub(crate) subjects: Vec<SubjectResult>,
    pub(crate) total_marks_obtained: f64,
    pub(crate) total_max_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) overall_grade: String,
    pub(crate) overall_status: PassStatus,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage_of(obtained: f64, max: f64) -> f64 {
    if max > 0.0 {
        obtained / max * 100.0
    } else {
        0.0
    }
}

/// Scores the full set of subject entries. An empty set scores 0% and fails.
/// Subject grades use the exact percentage; the overall grade uses the
/// reported two-decimal percentage.
pub(crate) fn score(entries: &[MarkEntry], scale: &GradingScale) -> ScoredResult {
    let subjects: Vec<SubjectResult> = entries
        .iter()
        .map(|entry| {
            let status = if entry.marks_obtained >= entry.passing_marks {
                PassStatus::Pass
            } else {
                PassStatus::Fail
            };
            let grade = scale.grade_for(percentage_of(entry.marks_obtained, entry.max_marks));
            SubjectResult {
                subject_name: entry.subject_name.clone(),
                marks_obtained: entry.marks_obtained,
                max_marks: entry.max_marks,
                passing_marks: entry.passing_marks,
                grade: grade.to_string(),
                status,
                graded_by: entry.graded_by.clone(),
            }
        })
        .collect();

    let total_marks_obtained: f64 = entries.iter().map(|entry| entry.marks_obtained).sum();
    let total_max_marks: f64 = entries.iter().map(|entry| entry.max_marks).sum();
    let percentage = round2(percentage_of(total_marks_obtained, total_max_marks));

    let overall_status = if !subjects.is_empty()
        && subjects.iter().all(|subject| subject.status == PassStatus::Pass)
    {
        PassStatus::Pass
    } else {
        PassStatus::Fail
    };

    ScoredResult {
        overall_grade: scale.grade_for(percentage).to_string(),
        subjects,
        total_marks_obtained,
        total_max_marks,
        percentage,
        overall_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, obtained: f64, max: f64, passing: f64) -> MarkEntry {
        MarkEntry {
            subject_name: name.to_string(),
            marks_obtained: obtained,
            max_marks: max,
            passing_marks: passing,
            graded_by: None,
        }
    }

    #[test]
    fn default_bands_follow_policy_boundaries() {
        let scale = GradingScale::default();
        assert_eq!(scale.grade_for(100.0), "A+");
        assert_eq!(scale.grade_for(90.0), "A+");
        assert_eq!(scale.grade_for(89.99), "A");
        assert_eq!(scale.grade_for(80.0), "A");
        assert_eq!(scale.grade_for(70.0), "B+");
        assert_eq!(scale.grade_for(60.0), "B");
        assert_eq!(scale.grade_for(59.99), "C");
        assert_eq!(scale.grade_for(50.0), "C");
        assert_eq!(scale.grade_for(33.0), "D");
        assert_eq!(scale.grade_for(32.99), "F");
        assert_eq!(scale.grade_for(0.0), "F");
    }

    #[test]
    fn scoring_two_passing_subjects() {
        let scored = score(
            &[entry("Mathematics", 72.0, 100.0, 40.0), entry("Science", 50.0, 100.0, 35.0)],
            &GradingScale::default(),
        );

        assert_eq!(scored.total_marks_obtained, 122.0);
        assert_eq!(scored.total_max_marks, 200.0);
        assert_eq!(scored.percentage, 61.0);
        assert_eq!(scored.overall_grade, "B");
        assert_eq!(scored.overall_status, PassStatus::Pass);
        assert_eq!(scored.subjects[0].grade, "B+");
        assert_eq!(scored.subjects[1].grade, "C");
    }

    #[test]
    fn one_failed_subject_fails_overall() {
        let scored = score(
            &[entry("Mathematics", 95.0, 100.0, 40.0), entry("Science", 34.0, 100.0, 35.0)],
            &GradingScale::default(),
        );

        assert_eq!(scored.subjects[1].status, PassStatus::Fail);
        assert_eq!(scored.overall_status, PassStatus::Fail);
        assert_eq!(scored.percentage, 64.5);
        assert_eq!(scored.overall_grade, "B");
    }

    #[test]
    fn passing_marks_boundary_is_a_pass() {
        let scored = score(&[entry("Art", 40.0, 100.0, 40.0)], &GradingScale::default());
        assert_eq!(scored.subjects[0].status, PassStatus::Pass);
    }

    #[test]
    fn subject_grade_is_not_rounded_up_into_the_next_band() {
        let scored = score(&[entry("Physics", 899.96, 1000.0, 400.0)], &GradingScale::default());
        assert_eq!(scored.subjects[0].grade, "A");
        assert_eq!(scored.percentage, 90.0);
        assert_eq!(scored.overall_grade, "A+");
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let scored = score(&[entry("History", 2.0, 3.0, 1.0)], &GradingScale::default());
        assert_eq!(scored.percentage, 66.67);
    }

    #[test]
    fn totals_stay_within_bounds_for_mixed_entries() {
        let entries = vec![
            entry("A", 0.0, 50.0, 20.0),
            entry("B", 80.0, 80.0, 30.0),
            entry("C", 12.5, 25.0, 10.0),
        ];
        let scored = score(&entries, &GradingScale::default());

        assert!(scored.total_marks_obtained >= 0.0);
        assert!(scored.total_marks_obtained <= scored.total_max_marks);
        let all_pass = scored.subjects.iter().all(|subject| subject.status == PassStatus::Pass);
        assert_eq!(scored.overall_status == PassStatus::Pass, all_pass);
    }

    #[test]
    fn empty_entries_fail_with_zero_percentage() {
        let scored = score(&[], &GradingScale::default());
        assert_eq!(scored.percentage, 0.0);
        assert_eq!(scored.overall_status, PassStatus::Fail);
        assert_eq!(scored.overall_grade, "F");
    }

    #[test]
    fn custom_scale_parses_and_sorts() {
        let scale = GradingScale::parse("50:Pass, 75:Merit, *:Below").expect("scale");
        assert_eq!(scale.grade_for(80.0), "Merit");
        assert_eq!(scale.grade_for(60.0), "Pass");
        assert_eq!(scale.grade_for(10.0), "Below");

        assert!(GradingScale::parse("").is_err());
        assert!(GradingScale::parse("120:X").is_err());
        assert!(GradingScale::parse("60:A,60:B").is_err());
        assert!(GradingScale::parse("60").is_err());
    }
}
