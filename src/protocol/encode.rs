use crate::prelude::*;
use super::wire::{var, Position};

pub trait ToWire {
    fn encode(&self, buf: &mut Vec<u8>);
}
impl ToWire for () {
    fn encode(&self, _: &mut Vec<u8>) {}
}
impl<T: ToWire + ?Sized> ToWire for &'_ T {
    fn encode(&self, buf: &mut Vec<u8>) {
        (**self).encode(buf)
    }
}
/// Length-prefixed sequence.
impl<T: ToWire> ToWire for [T] {
    fn encode(&self, buf: &mut Vec<u8>) {
        var(self.len()).encode(buf);
        for v in self {
            v.encode(buf);
        }
    }
}
impl<T: ToWire> ToWire for Vec<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_slice().encode(buf)
    }
}
/// Fixed-size sequence, no prefix.
impl<T: ToWire, const N: usize> ToWire for [T; N] {
    fn encode(&self, buf: &mut Vec<u8>) {
        for v in self {
            v.encode(buf);
        }
    }
}
/// Bytes written as-is, without a length prefix.
pub struct Raw<'a>(pub &'a [u8]);
impl ToWire for Raw<'_> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.0)
    }
}
/// Elements written back to back, without a length prefix.
pub struct Each<I>(pub I);
impl<I: Clone + IntoIterator> ToWire for Each<I>
where
    I::Item: ToWire,
{
    fn encode(&self, buf: &mut Vec<u8>) {
        for v in self.0.clone() {
            v.encode(buf);
        }
    }
}
pub struct ToWireFn<F: Fn(&mut Vec<u8>)>(pub F);
impl<F: Fn(&mut Vec<u8>)> ToWire for ToWireFn<F> {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.0)(buf)
    }
}
impl ToWire for bool {
    fn encode(&self, buf: &mut Vec<u8>) {
        (*self as u8).encode(buf)
    }
}
impl ToWire for str {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_bytes().encode(buf)
    }
}
impl ToWire for String {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.as_str().encode(buf)
    }
}
impl<T: ToWire> ToWire for Option<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            None => false.encode(buf),
            Some(v) => (true, v).encode(buf),
        }
    }
}

const CONTINUE_BIT: u8 = 0b1000_0000;
impl ToWire for var<u64> {
    fn encode(&self, buf: &mut Vec<u8>) {
        let mut n = self.0;
        while n & !((!CONTINUE_BIT) as u64) != 0 {
            buf.push(n as u8 & !CONTINUE_BIT | CONTINUE_BIT);
            n >>= 7;
        }
        buf.push(n as u8);
    }
}
impl ToWire for var<u32> {
    fn encode(&self, buf: &mut Vec<u8>) {
        var(self.0 as u64).encode(buf)
    }
}
impl ToWire for var<i32> {
    fn encode(&self, buf: &mut Vec<u8>) {
        var(self.0 as u32).encode(buf)
    }
}
impl ToWire for var<i64> {
    fn encode(&self, buf: &mut Vec<u8>) {
        var(self.0 as u64).encode(buf)
    }
}
impl ToWire for var<usize> {
    fn encode(&self, buf: &mut Vec<u8>) {
        var(self.0 as u32).encode(buf)
    }
}

impl<T: ToWire> ToWire for V3<T> {
    fn encode(&self, buf: &mut Vec<u8>) {
        (&self.x, &self.y, &self.z).encode(buf)
    }
}
impl ToWire for Position {
    fn encode(&self, buf: &mut Vec<u8>) {
        let V3 { x, y, z } = self.0;
        (((x as u64 & 0x3FFFFFF) << 38) | ((y as u64 & 0xFFF) << 26) | (z as u64 & 0x3FFFFFF)).encode(buf)
    }
}
impl ToWire for Uuid {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf)
    }
}
impl ToWire for Angle {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf)
    }
}
impl ToWire for Chat {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf)
    }
}
impl ToWire for Nbt {
    fn encode(&self, buf: &mut Vec<u8>) {
        super::nbt::write(self, buf)
    }
}
impl ToWire for Slot {
    fn encode(&self, buf: &mut Vec<u8>) {
        if self.is_empty() {
            false.encode(buf)
        } else {
            (true, var(self.id), self.count, &self.nbt).encode(buf)
        }
    }
}
impl ToWire for Metadata {
    fn encode(&self, buf: &mut Vec<u8>) {
        for (index, entry) in &self.0 {
            (index, var(entry.kind), Raw(&entry.raw)).encode(buf);
        }
        0xFFu8.encode(buf);
    }
}

macro_rules! impl_tuple {
    ($a:ident $b:ident) => {
        impl<$a: ToWire, $b: ToWire> ToWire for ($a, $b) {
            fn encode(&self, buf: &mut Vec<u8>) {
                self.0.encode(buf);
                self.1.encode(buf);
            }
        }
    };
    ($i:ident $($t:tt)*) => {
        #[allow(non_snake_case)]
        impl<$i: ToWire, $($t: ToWire),*> ToWire for ($i, $($t),*) {
            fn encode(&self, buf: &mut Vec<u8>) {
                let ($i, $($t),*) = self;
                ($i, ($($t,)*)).encode(buf)
            }
        }
        impl_tuple!($($t)*);
    }
}
impl_tuple!(A B C D E F G H I J K L M N O P);
impl<A: ToWire> ToWire for (A,) {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.0.encode(buf)
    }
}
macro_rules! impl_n {
    ($($t:ident)*) => {$(
        impl ToWire for $t {
            fn encode(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_be_bytes());
            }
        }
    )*};
}
impl_n!(u8 i8 u16 i16 i32 i64 u64 u128 f32 f64);
