/// Product of a numeric coefficient and symbolic factors.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// Numeric coefficient.
    pub coefficient: f64,
    /// Symbolic factors, multiplied in order.
    pub factors: Vec<String>,
}

impl Term {
    /// Term `coefficient·Π factors`.
    pub fn new(coefficient: f64, factors: Vec<String>) -> Self {
        Self {
            coefficient,
            factors,
        }
    }

    fn magnitude(&self) -> String {
        let number = format_number(self.coefficient.abs());
        if self.factors.is_empty() {
            number
        } else if self.coefficient.abs() == 1.0 {
            self.factors.join("*")
        } else {
            format!("{number}*{}", self.factors.join("*"))
        }
    }

    /// The term on its own, with a leading `-` when negative.
    pub fn render_single(&self) -> String {
        if self.coefficient < 0.0 {
            format!("-{}", self.magnitude())
        } else {
            self.magnitude()
        }
    }

    /// Sum of `terms` without spaces or doubled signs. Zero terms are dropped
    /// and an empty sum renders as `0`.
    pub fn render_sum(terms: &[Term]) -> String {
        let mut out = String::new();
        for term in terms.iter().filter(|term| term.coefficient != 0.0) {
            if out.is_empty() {
                out.push_str(&term.render_single());
            } else {
                out.push(if term.coefficient < 0.0 { '-' } else { '+' });
                out.push_str(&term.magnitude());
            }
        }
        if out.is_empty() {
            out.push('0');
        }
        out
    }
}

/// Shortest round-trip text of `value`, switching to `E` notation outside
/// `[1e-4, 1e15)`.
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || (1e-4..1e15).contains(&magnitude) {
        format!("{value}")
    } else {
        format!("{value:E}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_are_merged() {
        let terms = [
            Term::new(-2.5, vec!["X".to_string()]),
            Term::new(-1.0, Vec::new()),
            Term::new(0.0, vec!["Y".to_string()]),
            Term::new(3.0, vec!["T**(-1)".to_string()]),
        ];
        assert_eq!(Term::render_sum(&terms), "-2.5*X-1+3*T**(-1)");
        assert_eq!(Term::render_sum(&[]), "0");
    }

    #[test]
    fn unit_coefficients_are_implicit() {
        let term = Term::new(-1.0, vec!["EXP(X)".to_string()]);
        assert_eq!(term.render_single(), "-EXP(X)");
    }

    #[test]
    fn extreme_magnitudes_use_exponents() {
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(1200.0), "1200");
        assert_eq!(format_number(2e-7), "2E-7");
        assert_eq!(format_number(0.0), "0");
    }
}
