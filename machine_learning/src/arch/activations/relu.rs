/// Rectified linear unit with an optional negative slope and output shift.
#[derive(Clone, Debug, Default)]
pub struct Relu {
    leak: f32,
    sub: f32,
}

impl Relu {
    pub fn new(leak: f32, sub: f32) -> Self {
        Self { leak, sub }
    }

    pub fn f(&self, z: f32) -> f32 {
        let a = if z > 0. { z } else { self.leak * z };
        a - self.sub
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.leak }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_relu_clamps_negatives() {
        let r = Relu::default();
        assert_eq!(r.f(-3.), 0.);
        assert_eq!(r.f(2.), 2.);
        assert_eq!(r.df(-3.), 0.);
        assert_eq!(r.df(2.), 1.);
    }

    #[test]
    fn general_relu_leaks_and_shifts() {
        let r = Relu::new(0.1, 0.4);
        assert!((r.f(-1.) - (-0.5)).abs() < 1e-6);
        assert!((r.f(1.) - 0.6).abs() < 1e-6);
        assert_eq!(r.df(-1.), 0.1);
    }
}
