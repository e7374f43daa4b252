use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle<T: Clone> {
    pub weight: f64,
    pub value: T,
}

/// A fixed size set of weighted particles. The last particle is the *anchor*: callers are
/// expected to propagate it without noise, and resampling never replaces it.
#[derive(Debug, Clone)]
pub struct ParticleFilter<T: Clone> {
    particles: Vec<Particle<T>>,
    max_particle: usize,
}

impl<T: Clone> ParticleFilter<T> {
    pub fn new(number_of_particles: usize, initial_value: T) -> Self {
        assert!(number_of_particles > 0, "Must have at least one particle");

        Self {
            particles: vec![
                Particle {
                    weight: 1.0 / number_of_particles as f64,
                    value: initial_value
                };
                number_of_particles
            ],
            max_particle: number_of_particles - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn anchor_idx(&self) -> usize {
        self.particles.len() - 1
    }

    pub fn particles(&self) -> &[Particle<T>] {
        &self.particles
    }

    pub fn particle_value(&self, index: usize) -> &T {
        &self.particles[index].value
    }

    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.particles.iter().map(|p| p.weight)
    }

    /// Lets `f` modify the value of every particle. The second argument tells whether the
    /// particle is the anchor.
    pub fn propagate(&mut self, mut f: impl FnMut(&mut T, bool)) {
        let anchor = self.anchor_idx();
        for (i, p) in self.particles.iter_mut().enumerate() {
            f(&mut p.value, i == anchor);
        }
    }

    /// Sets the weight of each particle to the (non-negative) score computed by `f`, normalizes
    /// the weights by `sum + epsilon` and returns the index of the strongest particle. Ties go to
    /// the lowest index.
    pub fn weigh(&mut self, mut f: impl FnMut(&T) -> f64, epsilon: f64) -> usize {
        for p in self.particles.iter_mut() {
            p.weight = f(&p.value).max(0.0);
        }

        self.normalize_weights(epsilon);

        self.max_particle = self
            .particles
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| {
                if p.weight > self.particles[best].weight {
                    i
                } else {
                    best
                }
            });
        self.max_particle
    }

    fn normalize_weights(&mut self, epsilon: f64) {
        let sum: f64 = self.particles.iter().map(|p| p.weight).sum::<f64>() + epsilon;

        for p in self.particles.iter_mut() {
            p.weight /= sum;
        }
    }

    /// Computes the number of effective particles, `1 / sum(w^2)`. Only informative, resampling
    /// does not depend on it.
    pub fn number_of_effective_particles(&self) -> f64 {
        let sum_sq = self
            .particles
            .iter()
            .map(|p| p.weight * p.weight)
            .sum::<f64>();
        if sum_sq > 0.0 {
            1.0 / sum_sq
        } else {
            0.0
        }
    }

    pub fn strongest_particle_idx(&self) -> usize {
        self.max_particle
    }

    /// Stratified resampling of every particle except the anchor.
    ///
    /// The particles are sorted by ascending weight and the cumulative weight is built over that
    /// order. For each of the `N-1` non-anchor slots a uniform variate in `[0, 1)` is drawn and
    /// the first sorted particle whose cumulative weight reaches it is copied into the slot.
    /// Afterwards all weights are `1/N`. If all weights are zero the particles are drawn as if
    /// the weights were uniform.
    pub fn resample<R: Rng>(&mut self, rng: &mut R) {
        let num_particles = self.particles.len();
        let anchor = self.anchor_idx();

        // stable sort, equal weights keep their index order
        let mut order: Vec<usize> = (0..num_particles).collect();
        order.sort_by(|&a, &b| {
            self.particles[a]
                .weight
                .total_cmp(&self.particles[b].weight)
        });

        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        let cumulative: Vec<f64> = if total > 0.0 {
            order
                .iter()
                .scan(0.0, |acc, &i| {
                    *acc += self.particles[i].weight;
                    Some(*acc)
                })
                .collect()
        } else {
            (1..=num_particles)
                .map(|k| k as f64 / num_particles as f64)
                .collect()
        };

        let drawn: Vec<T> = (0..anchor)
            .map(|_| {
                let u: f64 = rng.gen();
                // the last entry may be slightly below 1, fall back to the heaviest particle
                let j = cumulative
                    .iter()
                    .position(|&c| c >= u)
                    .unwrap_or(num_particles - 1);
                self.particles[order[j]].value.clone()
            })
            .collect();

        for (particle, value) in self.particles.iter_mut().zip(drawn) {
            particle.value = value;
        }

        for particle in self.particles.iter_mut() {
            particle.weight = 1.0 / num_particles as f64;
        }
    }
}
