/// A logistic curve scaled to `(0, amp)`.
#[derive(Clone, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    fn logistic(z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp * Self::logistic(z)
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = Self::logistic(z);
        self.amp * s * (1. - s)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}
