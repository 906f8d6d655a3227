use crate::traits::{AdaptiveStepper, DynamicalSystem, Scalar};

#[inline]
fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// How an embedded pair turns its stage derivatives into an error estimate.
///
/// Weight vectors cover every stage plus the derivative at the candidate
/// state, so they are one entry longer than `b`.
pub enum ErrorEstimator {
    /// err = dt * sum(e_i * k_i)
    Embedded(&'static [f64]),
    /// Dormand-Prince 8(5,3): a 5th order estimate softened by a 3rd order one.
    Blended {
        e3: &'static [f64],
        e5: &'static [f64],
    },
}

/// Butcher tableau of an explicit embedded Runge-Kutta pair.
pub struct Tableau {
    pub name: &'static str,
    pub order: usize,
    pub error_order: usize,
    pub c: &'static [f64],
    /// Lower-triangular rows; row `i` has `i` entries.
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub estimator: ErrorEstimator,
}

impl Tableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }
}

/// Bogacki-Shampine 3(2).
pub static RK23: Tableau = Tableau {
    name: "RK23",
    order: 3,
    error_order: 2,
    c: &[0.0, 1.0 / 2.0, 3.0 / 4.0],
    a: &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    estimator: ErrorEstimator::Embedded(&[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0]),
};

/// Dormand-Prince 5(4).
pub static DOPRI5: Tableau = Tableau {
    name: "RK45",
    order: 5,
    error_order: 4,
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
    estimator: ErrorEstimator::Embedded(&[
        -71.0 / 57600.0,
        0.0,
        71.0 / 16695.0,
        -71.0 / 1920.0,
        17253.0 / 339200.0,
        -22.0 / 525.0,
        1.0 / 40.0,
    ]),
};

/// Dormand-Prince 8(5,3), Hairer's coefficients.
#[allow(clippy::excessive_precision)]
pub static DOP853: Tableau = Tableau {
    name: "DOP853",
    order: 8,
    error_order: 7,
    c: &[
        0.0,
        0.526001519587677318785587544488e-01,
        0.789002279381515978178381316732e-01,
        0.118350341907227396726757197510,
        0.281649658092772603273242802490,
        0.333333333333333333333333333333,
        0.25,
        0.307692307692307692307692307692,
        0.651282051282051282051282051282,
        0.6,
        0.857142857142857142857142857142,
        1.0,
    ],
    a: &[
        &[],
        &[5.26001519587677318785587544488e-2],
        &[
            1.97250569845378994544595329183e-2,
            5.91751709536136983633785987549e-2,
        ],
        &[
            2.95875854768068491816892993775e-2,
            0.0,
            8.87627564304205475450678981324e-2,
        ],
        &[
            2.41365134159266685502369798665e-1,
            0.0,
            -8.84549479328286085344864962717e-1,
            9.24834003261792003115737966543e-1,
        ],
        &[
            3.7037037037037037037037037037e-2,
            0.0,
            0.0,
            1.70828608729473871279604482173e-1,
            1.25467687566822425016691814123e-1,
        ],
        &[
            3.7109375e-2,
            0.0,
            0.0,
            1.70252211019544039314978060272e-1,
            6.02165389804559606850219397283e-2,
            -1.7578125e-2,
        ],
        &[
            3.70920001185047927108779319836e-2,
            0.0,
            0.0,
            1.70383925712239993810214054705e-1,
            1.07262030446373284651809199168e-1,
            -1.53194377486244017527936158236e-2,
            8.27378916381402288758473766002e-3,
        ],
        &[
            6.24110958716075717114429577812e-1,
            0.0,
            0.0,
            -3.36089262944694129406857109825,
            -8.68219346841726006818189891453e-1,
            2.75920996994467083049415600797e1,
            2.01540675504778934086186788979e1,
            -4.34898841810699588477366255144e1,
        ],
        &[
            4.77662536438264365890433908527e-1,
            0.0,
            0.0,
            -2.48811461997166764192642586468,
            -5.90290826836842996371446475743e-1,
            2.12300514481811942347288949897e1,
            1.52792336328824235832596922938e1,
            -3.32882109689848629194453265587e1,
            -2.03312017085086261358222928593e-2,
        ],
        &[
            -9.3714243008598732571704021658e-1,
            0.0,
            0.0,
            5.18637242884406370830023853209,
            1.09143734899672957818500254654,
            -8.14978701074692612513997267357,
            -1.85200656599969598641566180701e1,
            2.27394870993505042818970056734e1,
            2.49360555267965238987089396762,
            -3.0467644718982195003823669022,
        ],
        &[
            2.27331014751653820792359768449,
            0.0,
            0.0,
            -1.05344954667372501984066689879e1,
            -2.00087205822486249909675718444,
            -1.79589318631187989172765950534e1,
            2.79488845294199600508499808837e1,
            -2.85899827713502369474065508674,
            -8.87285693353062954433549289258,
            1.23605671757943030647266201528e1,
            6.43392746015763530355970484046e-1,
        ],
    ],
    b: &[
        5.42937341165687622380535766363e-2,
        0.0,
        0.0,
        0.0,
        0.0,
        4.45031289275240888144113950566,
        1.89151789931450038304281599044,
        -5.8012039600105847814672114227,
        3.1116436695781989440891606237e-1,
        -1.52160949662516078556178806805e-1,
        2.01365400804030348374776537501e-1,
        4.47106157277725905176885569043e-2,
    ],
    estimator: ErrorEstimator::Blended {
        // b minus the 3rd order weights (bhh1, bhh2, bhh3 at stages 1, 9, 12).
        e3: &[
            5.42937341165687622380535766363e-2 - 0.244094488188976377952755905512,
            0.0,
            0.0,
            0.0,
            0.0,
            4.45031289275240888144113950566,
            1.89151789931450038304281599044,
            -5.8012039600105847814672114227,
            3.1116436695781989440891606237e-1 - 0.733846688281611857341361741547,
            -1.52160949662516078556178806805e-1,
            2.01365400804030348374776537501e-1,
            4.47106157277725905176885569043e-2 - 0.220588235294117647058823529412e-1,
            0.0,
        ],
        e5: &[
            0.1312004499419488073250102996e-1,
            0.0,
            0.0,
            0.0,
            0.0,
            -0.1225156446376204440720569753e+1,
            -0.4957589496572501915214079952,
            0.1664377182454986536961530415e+1,
            -0.3503288487499736816886487290,
            0.3341791187130174790297318841,
            0.8192320648511571246570742613e-1,
            -0.2235530786388629525884427845e-1,
            0.0,
        ],
    },
};

/// Explicit embedded Runge-Kutta stepper driven by a static tableau.
/// Stage buffers are allocated once and reused across attempts.
pub struct ExplicitRk<T: Scalar> {
    tableau: &'static Tableau,
    k: Vec<Vec<T>>,
    tmp: Vec<T>,
}

impl<T: Scalar> ExplicitRk<T> {
    pub fn new(tableau: &'static Tableau, dim: usize) -> Self {
        let z = T::zero();
        Self {
            tableau,
            k: vec![vec![z; dim]; tableau.stages() + 1],
            tmp: vec![z; dim],
        }
    }

    pub fn rk23(dim: usize) -> Self {
        Self::new(&RK23, dim)
    }

    pub fn dopri5(dim: usize) -> Self {
        Self::new(&DOPRI5, dim)
    }

    pub fn dop853(dim: usize) -> Self {
        Self::new(&DOP853, dim)
    }

    pub fn tableau(&self) -> &'static Tableau {
        self.tableau
    }

    fn weighted_sum(&self, weights: &[f64], component: usize) -> T {
        let mut acc = T::zero();
        for (j, &w) in weights.iter().enumerate() {
            if w != 0.0 {
                acc = acc + lit::<T>(w) * self.k[j][component];
            }
        }
        acc
    }

    fn error_norm(&self, state: &[T], state_out: &[T], dt: T, rtol: T, atol: T) -> T {
        let n = state.len();
        if n == 0 {
            return T::zero();
        }
        let n_t = lit::<T>(n as f64);
        match &self.tableau.estimator {
            ErrorEstimator::Embedded(e) => {
                let mut sum = T::zero();
                for i in 0..n {
                    let scale = atol + state[i].abs().max(state_out[i].abs()) * rtol;
                    let err = dt * self.weighted_sum(e, i) / scale;
                    sum = sum + err * err;
                }
                (sum / n_t).sqrt()
            }
            ErrorEstimator::Blended { e3, e5 } => {
                let mut err5_sq = T::zero();
                let mut err3_sq = T::zero();
                for i in 0..n {
                    let scale = atol + state[i].abs().max(state_out[i].abs()) * rtol;
                    let err5 = self.weighted_sum(e5, i) / scale;
                    let err3 = self.weighted_sum(e3, i) / scale;
                    err5_sq = err5_sq + err5 * err5;
                    err3_sq = err3_sq + err3 * err3;
                }
                if err5_sq == T::zero() && err3_sq == T::zero() {
                    return T::zero();
                }
                let denom = err5_sq + lit::<T>(0.01) * err3_sq;
                dt.abs() * err5_sq / (denom * n_t).sqrt()
            }
        }
    }
}

impl<T: Scalar> AdaptiveStepper<T> for ExplicitRk<T> {
    fn error_order(&self) -> usize {
        self.tableau.error_order
    }

    fn evaluations_per_step(&self) -> usize {
        // k1 is reused from the previous step; the candidate derivative is new.
        self.tableau.stages()
    }

    fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        f0: &[T],
        dt: T,
        rtol: T,
        atol: T,
        state_out: &mut [T],
        f_out: &mut [T],
    ) -> T {
        let stages = self.tableau.stages();
        let n = state.len();

        self.k[0].copy_from_slice(f0);

        for s in 1..stages {
            let row = self.tableau.a[s];
            for i in 0..n {
                self.tmp[i] = state[i] + dt * self.weighted_sum(row, i);
            }
            let ts = t + lit::<T>(self.tableau.c[s]) * dt;
            system.apply(ts, &self.tmp, &mut self.k[s]);
        }

        for i in 0..n {
            state_out[i] = state[i] + dt * self.weighted_sum(self.tableau.b, i);
        }

        system.apply(t + dt, state_out, f_out);
        self.k[stages].copy_from_slice(f_out);

        self.error_norm(state, state_out, dt, rtol, atol)
    }
}
