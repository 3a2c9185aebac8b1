//! Sets over closed flag enums, used by set-valued (union) settings.
//!
//! A [`FlagSet`] records a decision per flag: allowed, denied, or left open. Denials let a
//! higher priority zone strip a flag that a lower one grants. The typed set is a thin view over
//! [`FlagBits`], which is what hosts store and the evaluator combines.

use std::fmt;
use std::marker::PhantomData;

/// A closed enumeration usable inside a [`FlagSet`]. Implement it with [`define_flags!`].
pub trait Flag: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every variant, in declaration order. At most 64.
    const VARIANTS: &'static [Self];
    /// Persisted names, parallel to `VARIANTS`.
    const NAMES: &'static [&'static str];

    fn index(self) -> usize;

    #[must_use]
    fn name(self) -> &'static str {
        Self::NAMES[self.index()]
    }

    #[must_use]
    fn from_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| Self::VARIANTS[i])
    }
}

/// Declare a flag enum and its [`Flag`] impl.
///
/// ```
/// realmguard_core::define_flags! {
///     /// Doors and the like.
///     pub enum Usable {
///         Door = "door",
///         Lever = "lever",
///     }
/// }
/// # use realmguard_core::flags::Flag;
/// assert_eq!(Usable::Lever.name(), "lever");
/// ```
#[macro_export]
macro_rules! define_flags {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $id:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $crate::flags::Flag for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];
            const NAMES: &'static [&'static str] = &[$($id),+];

            fn index(self) -> usize {
                self as usize
            }
        }
    };
}

/// Untyped allow/deny masks. Bit `i` refers to the flag with index `i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagBits {
    pub allow: u64,
    pub deny: u64,
}

impl FlagBits {
    pub const EMPTY: Self = Self { allow: 0, deny: 0 };

    /// Flags with an explicit decision.
    #[must_use]
    pub const fn decided(self) -> u64 {
        self.allow | self.deny
    }

    /// Fill the flags `self` leaves open with the decisions of `lower`.
    #[must_use]
    pub const fn layered_over(self, lower: Self) -> Self {
        let open = !self.decided();
        Self {
            allow: self.allow | (lower.allow & open),
            deny: self.deny | (lower.deny & open),
        }
    }

    /// Drop denials, keeping only what is allowed.
    #[must_use]
    pub const fn allowed_only(self) -> Self {
        Self {
            allow: self.allow,
            deny: 0,
        }
    }
}

/// Set of `E` flags with per-flag allow/deny decisions.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagSet<E: Flag> {
    bits: FlagBits,
    _flag: PhantomData<E>,
}

impl<E: Flag> Default for FlagSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Flag> FlagSet<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: FlagBits::EMPTY,
            _flag: PhantomData,
        }
    }

    /// Every flag allowed.
    #[must_use]
    pub fn all() -> Self {
        E::VARIANTS.iter().fold(Self::new(), |set, f| set.with(*f))
    }

    #[must_use]
    pub fn from_bits(bits: FlagBits) -> Self {
        let mask = Self::mask();
        // A flag is never both allowed and denied; denial wins.
        let deny = bits.deny & mask;
        Self {
            bits: FlagBits {
                allow: bits.allow & mask & !deny,
                deny,
            },
            _flag: PhantomData,
        }
    }

    #[must_use]
    pub const fn bits(self) -> FlagBits {
        self.bits
    }

    fn mask() -> u64 {
        match E::VARIANTS.len() {
            64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }

    fn bit(flag: E) -> u64 {
        1u64 << flag.index()
    }

    /// Allow `flag`, clearing any denial.
    pub fn insert(&mut self, flag: E) {
        let bit = Self::bit(flag);
        self.bits.allow |= bit;
        self.bits.deny &= !bit;
    }

    /// Explicitly deny `flag`, clearing any allowance.
    pub fn deny(&mut self, flag: E) {
        let bit = Self::bit(flag);
        self.bits.deny |= bit;
        self.bits.allow &= !bit;
    }

    /// Forget any decision about `flag`.
    pub fn clear(&mut self, flag: E) {
        let bit = Self::bit(flag);
        self.bits.allow &= !bit;
        self.bits.deny &= !bit;
    }

    #[must_use]
    pub fn with(mut self, flag: E) -> Self {
        self.insert(flag);
        self
    }

    #[must_use]
    pub fn without(mut self, flag: E) -> Self {
        self.deny(flag);
        self
    }

    #[must_use]
    pub fn contains(&self, flag: E) -> bool {
        self.bits.allow & Self::bit(flag) != 0
    }

    #[must_use]
    pub fn denies(&self, flag: E) -> bool {
        self.bits.deny & Self::bit(flag) != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.allow == 0
    }

    /// Allowed in either set. A flag denied by one side and allowed by the other ends up allowed.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        let allow = self.bits.allow | other.bits.allow;
        Self::from_bits(FlagBits {
            allow,
            deny: (self.bits.deny | other.bits.deny) & !allow,
        })
    }

    /// Allowed here and not allowed in `other`.
    #[must_use]
    pub fn subtract(self, other: Self) -> Self {
        Self::from_bits(FlagBits {
            allow: self.bits.allow & !other.bits.allow,
            deny: self.bits.deny,
        })
    }

    /// Keep this set's decisions and take `lower`'s for every flag left open.
    #[must_use]
    pub fn layered_over(self, lower: Self) -> Self {
        Self::from_bits(self.bits.layered_over(lower.bits))
    }

    /// Allowed flags in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = E> + '_ {
        E::VARIANTS.iter().copied().filter(|f| self.contains(*f))
    }

    /// Denied flags in declaration order.
    pub fn iter_denied(&self) -> impl Iterator<Item = E> + '_ {
        E::VARIANTS.iter().copied().filter(|f| self.denies(*f))
    }
}

impl<E: Flag> FromIterator<E> for FlagSet<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}

impl<E: Flag> fmt::Debug for FlagSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("allow", &self.iter().collect::<Vec<_>>())
            .field("deny", &self.iter_denied().collect::<Vec<_>>())
            .finish()
    }
}

impl<E: Flag> fmt::Display for FlagSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(flag.name())?;
            first = false;
        }
        for flag in self.iter_denied() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "-{}", flag.name())?;
            first = false;
        }
        Ok(())
    }
}
