//! Series and parallel composites.
//!
//! A [`Series`] holds an ordered list of regular children plus at most one
//! singular ideal current source (the source that pins the whole branch's
//! current); a [`Parallel`] is the dual, with a singular ideal voltage
//! source. Both cache their own characteristic the same way an elementary
//! component does.

use num_complex::Complex64;

use super::{Component, Core};
use crate::error::Result;
use crate::ivchar::IVChar;
use crate::phasor::Phasor;

/// A series composite: `short_circuit & child₁ & child₂ & …`, or the
/// singular current source's own characteristic if one is present.
#[derive(Debug, Clone)]
pub struct Series {
    pub(crate) core: Core,
    pub(crate) children: Vec<Component>,
    pub(crate) singular: Option<Box<Component>>,
}

/// A parallel composite: `open_circuit | child₁ | child₂ | …`, or the
/// singular voltage source's own characteristic if one is present.
#[derive(Debug, Clone)]
pub struct Parallel {
    pub(crate) core: Core,
    pub(crate) children: Vec<Component>,
    pub(crate) singular: Option<Box<Component>>,
}

impl Series {
    pub(crate) fn empty() -> Self {
        Series { core: Core::new("series"), children: Vec::new(), singular: None }
    }
}

impl Parallel {
    pub(crate) fn empty() -> Self {
        Parallel { core: Core::new("parallel"), children: Vec::new(), singular: None }
    }
}

pub(super) fn series_characteristic(s: &mut Series, omega: f64) -> Result<IVChar> {
    if let Some((iv, w)) = s.core.cache {
        if w == omega {
            return Ok(iv);
        }
    }
    let iv = if let Some(singular) = s.singular.as_mut() {
        singular.characteristic(omega, true)?
    } else {
        let mut acc = IVChar::short_circuit();
        for child in s.children.iter_mut() {
            let child_iv = child.characteristic(omega, true)?;
            acc = acc.series(&child_iv)?;
        }
        acc
    };
    s.core.cache = Some((iv, omega));
    Ok(iv)
}

pub(super) fn parallel_characteristic(p: &mut Parallel, omega: f64) -> Result<IVChar> {
    if let Some((iv, w)) = p.core.cache {
        if w == omega {
            return Ok(iv);
        }
    }
    let iv = if let Some(singular) = p.singular.as_mut() {
        singular.characteristic(omega, true)?
    } else {
        let mut acc = IVChar::open_circuit();
        for child in p.children.iter_mut() {
            let child_iv = child.characteristic(omega, true)?;
            acc = acc.parallel(&child_iv)?;
        }
        acc
    };
    p.core.cache = Some((iv, omega));
    Ok(iv)
}

/// A series branch's current is fixed by its own singular source; an
/// external current cannot also be imposed on it.
pub(super) fn apply_current_series<T: Phasor>(
    s: &mut Series,
    current: T,
    omega: f64,
    recursive: bool,
) -> Result<(T, T)> {
    if s.singular.is_some() {
        return Err(super::configuration_error(
            "cannot apply an external current to a series branch with a fixed-current source",
        ));
    }
    let raw = series_characteristic(s, omega)?;
    let voltage = raw.voltage_at_current(current.clone())?;
    s.core.state = Some(T::pack_state(current.clone(), voltage.clone()));
    if recursive {
        for child in s.children.iter_mut() {
            let scaled = current.scale(child.orientation() as f64);
            child.apply_current(scaled, omega, true)?;
        }
    }
    Ok((current, voltage))
}

pub(super) fn apply_voltage_series<T: Phasor>(
    s: &mut Series,
    voltage: T,
    omega: f64,
    recursive: bool,
) -> Result<(T, T)> {
    let raw = series_characteristic(s, omega)?;
    let current = raw.current_at_voltage(voltage.clone())?;
    s.core.state = Some(T::pack_state(current.clone(), voltage.clone()));
    if !recursive {
        return Ok((current, voltage));
    }
    let mut residual = voltage.clone();
    for child in s.children.iter_mut() {
        let scaled_current = current.scale(child.orientation() as f64);
        let (_, child_voltage) = child.apply_current(scaled_current, omega, true)?;
        residual = residual.sub(&child_voltage.scale(child.orientation() as f64));
    }
    if let Some(singular) = s.singular.as_mut() {
        let pushed = residual.scale(singular.orientation() as f64);
        singular.apply_voltage(pushed, omega, true)?;
    }
    Ok((current, voltage))
}

pub(super) fn apply_current_parallel<T: Phasor>(
    p: &mut Parallel,
    current: T,
    omega: f64,
    recursive: bool,
) -> Result<(T, T)> {
    let raw = parallel_characteristic(p, omega)?;
    let voltage = raw.voltage_at_current(current.clone())?;
    p.core.state = Some(T::pack_state(current.clone(), voltage.clone()));
    if !recursive {
        return Ok((current, voltage));
    }
    let mut residual = current.clone();
    for child in p.children.iter_mut() {
        let scaled_voltage = voltage.scale(child.orientation() as f64);
        let (child_current, _) = child.apply_voltage(scaled_voltage, omega, true)?;
        residual = residual.sub(&child_current.scale(child.orientation() as f64));
    }
    if let Some(singular) = p.singular.as_mut() {
        let pushed = residual.scale(singular.orientation() as f64);
        singular.apply_current(pushed, omega, true)?;
    }
    Ok((current, voltage))
}

/// A parallel branch's voltage is fixed by its own singular source; an
/// external voltage cannot also be imposed on it.
pub(super) fn apply_voltage_parallel<T: Phasor>(
    p: &mut Parallel,
    voltage: T,
    omega: f64,
    recursive: bool,
) -> Result<(T, T)> {
    if p.singular.is_some() {
        return Err(super::configuration_error(
            "cannot apply an external voltage to a parallel branch with a fixed-voltage source",
        ));
    }
    let raw = parallel_characteristic(p, omega)?;
    let current = raw.current_at_voltage(voltage.clone())?;
    p.core.state = Some(T::pack_state(current.clone(), voltage.clone()));
    if recursive {
        for child in p.children.iter_mut() {
            let scaled = voltage.scale(child.orientation() as f64);
            child.apply_voltage(scaled, omega, true)?;
        }
    }
    Ok((current, voltage))
}

pub(super) fn absorb_into_series(s: &mut Series, child: Component) -> Result<()> {
    match child {
        Component::Series(mut other) => {
            if let Some(singular) = other.singular.take() {
                set_series_singular(s, *singular)?;
            }
            s.children.append(&mut other.children);
            Ok(())
        }
        Component::CurrentSource(_) => set_series_singular(s, child),
        other => {
            s.children.push(other);
            Ok(())
        }
    }
}

pub(super) fn absorb_into_parallel(p: &mut Parallel, child: Component) -> Result<()> {
    match child {
        Component::Parallel(mut other) => {
            if let Some(singular) = other.singular.take() {
                set_parallel_singular(p, *singular)?;
            }
            p.children.append(&mut other.children);
            Ok(())
        }
        Component::VoltageSource(_) => set_parallel_singular(p, child),
        other => {
            p.children.push(other);
            Ok(())
        }
    }
}

fn set_series_singular(s: &mut Series, component: Component) -> Result<()> {
    if s.singular.is_some() {
        return Err(super::configuration_error(
            "a series branch may hold at most one fixed-current source",
        ));
    }
    s.singular = Some(Box::new(component));
    Ok(())
}

fn set_parallel_singular(p: &mut Parallel, component: Component) -> Result<()> {
    if p.singular.is_some() {
        return Err(super::configuration_error(
            "a parallel branch may hold at most one fixed-voltage source",
        ));
    }
    p.singular = Some(Box::new(component));
    Ok(())
}

pub(super) fn find_state_in(
    children: &[Component],
    singular: &Option<Box<Component>>,
    label: &str,
) -> Option<(Complex64, Complex64)> {
    for child in children {
        if let Some(found) = child.state_at(label) {
            return Some(found);
        }
    }
    singular.as_ref().and_then(|s| s.state_at(label))
}
