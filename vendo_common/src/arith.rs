//! Implements the standard arithmetic traits for single-field newtype wrappers.

#[macro_export]
macro_rules! arith {
    ($t:ident: Add) => {
        impl std::ops::Add for $t {
            type Output = Self;

            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }
    };
    ($t:ident: Sub) => {
        impl std::ops::Sub for $t {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }
    };
    ($t:ident: AddAssign) => {
        impl std::ops::AddAssign for $t {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }
    };
    ($t:ident: SubAssign) => {
        impl std::ops::SubAssign for $t {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }
    };
    ($t:ident: Neg) => {
        impl std::ops::Neg for $t {
            type Output = Self;

            fn neg(self) -> Self {
                Self(-self.0)
            }
        }
    };
    ($t:ident: $($op:ident),+ $(,)?) => {
        $($crate::arith!($t: $op);)+
    };
}
