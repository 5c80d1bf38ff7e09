#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Priority oracles scoring (severity, travel time) pairs on a 0–100 scale.

use ambulance_dispatch_core::{OracleError, PriorityDomain, PriorityOracle};

const SEVERITY_CEILING: f64 = 6.0;
const TRAVEL_CEILING: f64 = 60.0;

fn dispatch_domain() -> PriorityDomain {
    PriorityDomain {
        severity_min: 0.0,
        severity_max: SEVERITY_CEILING,
        travel_time_max: TRAVEL_CEILING,
    }
}

/// Linear blend of severity and proximity.
///
/// Severity contributes up to 80 points and a short travel time up to 20.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrispPriority;

impl PriorityOracle for CrispPriority {
    fn domain(&self) -> PriorityDomain {
        dispatch_domain()
    }

    fn score(&self, severity: f64, travel_time: f64) -> Result<f64, OracleError> {
        let proximity = 1.0 - travel_time.min(TRAVEL_CEILING) / TRAVEL_CEILING;
        let score = (severity / 5.0) * 80.0 + proximity * 20.0;
        if score.is_finite() {
            Ok(score)
        } else {
            Err(OracleError::NonFinite)
        }
    }
}

/// Piecewise-linear membership function; triangles repeat their apex.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Trapezoid {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl Trapezoid {
    const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    const fn triangle(a: f64, apex: f64, c: f64) -> Self {
        Self::new(a, apex, apex, c)
    }

    fn grade(&self, x: f64) -> f64 {
        if x < self.a || x > self.d {
            0.0
        } else if x >= self.b && x <= self.c {
            1.0
        } else if x < self.b {
            (x - self.a) / (self.b - self.a)
        } else {
            (self.d - x) / (self.d - self.c)
        }
    }
}

const MINOR: usize = 0;
const MODERATE: usize = 1;
const CRITICAL: usize = 2;

const SHORT: usize = 0;
const MEDIUM: usize = 1;
const LONG: usize = 2;

const LOW: usize = 0;
const STANDARD: usize = 1;
const URGENT: usize = 2;
const LIFE_THREATENING: usize = 3;

const SEVERITY_TERMS: [Trapezoid; 3] = [
    Trapezoid::new(0.0, 0.0, 2.0, 3.0),
    Trapezoid::triangle(2.0, 3.0, 4.0),
    Trapezoid::new(3.0, 4.0, 6.0, 6.0),
];

const TRAVEL_TERMS: [Trapezoid; 3] = [
    Trapezoid::new(0.0, 0.0, 10.0, 20.0),
    Trapezoid::triangle(10.0, 30.0, 50.0),
    Trapezoid::new(40.0, 50.0, 60.0, 60.0),
];

const PRIORITY_TERMS: [Trapezoid; 4] = [
    Trapezoid::triangle(0.0, 0.0, 20.0),
    Trapezoid::triangle(20.0, 40.0, 60.0),
    Trapezoid::triangle(60.0, 80.0, 90.0),
    Trapezoid::triangle(90.0, 100.0, 100.0),
];

/// (severity term, travel term) ⇒ priority term.
const RULES: [(usize, usize, usize); 9] = [
    (CRITICAL, SHORT, LIFE_THREATENING),
    (CRITICAL, MEDIUM, LIFE_THREATENING),
    (CRITICAL, LONG, URGENT),
    (MODERATE, SHORT, URGENT),
    (MODERATE, MEDIUM, STANDARD),
    (MODERATE, LONG, LOW),
    (MINOR, SHORT, STANDARD),
    (MINOR, MEDIUM, LOW),
    (MINOR, LONG, LOW),
];

/// Mamdani fuzzy inference over severity and travel time.
///
/// Rules combine their antecedents with `min`, clip their consequent, and
/// the clipped sets are merged with `max`. The merged set is sampled at every
/// whole priority point and defuzzified by the centroid of its
/// piecewise-linear interpolation.
#[derive(Clone, Copy, Debug, Default)]
pub struct FuzzyPriority;

impl FuzzyPriority {
    fn activations(severity: f64, travel_time: f64) -> [f64; 4] {
        let mut strength = [0.0_f64; 4];
        for (severity_term, travel_term, priority_term) in RULES {
            let firing = SEVERITY_TERMS[severity_term]
                .grade(severity)
                .min(TRAVEL_TERMS[travel_term].grade(travel_time));
            strength[priority_term] = strength[priority_term].max(firing);
        }
        strength
    }

    fn aggregated(strength: &[f64; 4], x: f64) -> f64 {
        PRIORITY_TERMS
            .iter()
            .zip(strength)
            .map(|(term, level)| term.grade(x).min(*level))
            .fold(0.0, f64::max)
    }
}

impl PriorityOracle for FuzzyPriority {
    fn domain(&self) -> PriorityDomain {
        dispatch_domain()
    }

    fn score(&self, severity: f64, travel_time: f64) -> Result<f64, OracleError> {
        let strength = Self::activations(severity, travel_time);
        if strength.iter().all(|level| *level <= 0.0) {
            return Err(OracleError::NoRuleFired);
        }

        let mut area = 0.0;
        let mut moment = 0.0;
        let mut previous = (0.0, Self::aggregated(&strength, 0.0));
        for point in 1..=100 {
            let x = f64::from(point);
            let (x1, y1) = previous;
            let y2 = Self::aggregated(&strength, x);
            let segment = 0.5 * (x - x1) * (y1 + y2);
            if segment > 0.0 {
                let centroid = x1 + (x - x1) * (y1 + 2.0 * y2) / (3.0 * (y1 + y2));
                area += segment;
                moment += segment * centroid;
            }
            previous = (x, y2);
        }

        if area <= 0.0 {
            return Err(OracleError::NoRuleFired);
        }
        let score = moment / area;
        if score.is_finite() {
            Ok(score)
        } else {
            Err(OracleError::NonFinite)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambulance_dispatch_core::{evaluate_priority, PRIORITY_CEILING};

    fn close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn crisp_blend_matches_reference_points() {
        close(CrispPriority.score(5.0, 0.0).expect("score"), 100.0);
        close(CrispPriority.score(1.0, 60.0).expect("score"), 16.0);
        close(CrispPriority.score(3.0, 30.0).expect("score"), 58.0);
    }

    #[test]
    fn crisp_saturates_long_journeys() {
        assert_eq!(
            evaluate_priority(&CrispPriority, 5.0, f64::INFINITY, 0.0),
            80.0
        );
        assert_eq!(
            evaluate_priority(&CrispPriority, 6.0, 0.0, 0.0),
            PRIORITY_CEILING
        );
    }

    #[test]
    fn triangles_and_shoulders_grade_inputs() {
        close(SEVERITY_TERMS[MINOR].grade(0.0), 1.0);
        close(SEVERITY_TERMS[MINOR].grade(2.5), 0.5);
        close(SEVERITY_TERMS[MODERATE].grade(3.0), 1.0);
        close(SEVERITY_TERMS[CRITICAL].grade(6.0), 1.0);
        close(TRAVEL_TERMS[MEDIUM].grade(25.0), 0.75);
        close(TRAVEL_TERMS[LONG].grade(39.0), 0.0);
    }

    #[test]
    fn critical_nearby_call_is_life_threatening() {
        close(FuzzyPriority.score(5.0, 5.0).expect("rule fires"), 290.0 / 3.0);
    }

    #[test]
    fn minor_distant_call_is_low() {
        close(FuzzyPriority.score(1.0, 55.0).expect("rule fires"), 20.0 / 3.0);
    }

    #[test]
    fn moderate_medium_call_is_standard() {
        close(FuzzyPriority.score(3.0, 25.0).expect("rule fires"), 40.0);
    }

    #[test]
    fn fuzzy_scores_stay_in_range_across_the_domain() {
        for severity in 0..=12 {
            for minutes in 0..=60 {
                let score = FuzzyPriority
                    .score(f64::from(severity) * 0.5, f64::from(minutes))
                    .expect("some rule fires everywhere in the domain");
                assert!((0.0..=100.0).contains(&score));
            }
        }
    }

    #[test]
    fn fuzzy_prefers_severity_over_distance() {
        let critical = FuzzyPriority.score(5.0, 30.0).expect("fires");
        let minor = FuzzyPriority.score(1.0, 5.0).expect("fires");
        assert!(critical > minor);
    }
}
