use nom::error::{ErrorKind, ParseError, VerboseError, VerboseErrorKind};

pub type Input<'a> = &'a [u8];
pub type Result<'a, O> = nom::IResult<Input<'a>, O, VerboseError<Input<'a>>>;

/// Implements a `parse` function for an input enum, that allows it to be
/// parsed in terms of a numeric type.
///
/// Shamelessly borrowed from fasterthanlime's executable packer tutorial:
/// https://fasterthanli.me/series/making-our-own-executable-packer
#[macro_export]
macro_rules! impl_parse_for_enum {
    ($type: ident, $number_parser: ident) => {
        impl $type {
            pub fn parse(i: crate::parse::Input) -> crate::parse::Result<Self> {
                use nom::{
                    combinator::map_res,
                    error::{context, ErrorKind},
                    number::complete::$number_parser,
                };
                use std::convert::TryFrom;

                let parser = map_res($number_parser, |x| {
                    Self::try_from(x).map_err(|_| ErrorKind::Alt)
                });
                context(stringify!($type), parser)(i)
            }
        }
    };
}

/// Jump to `offset` bytes past the start of `i`. TIFF structures address their contents by
/// offsets from the start of the TIFF header, so this is how we follow those pointers without
/// risking an out-of-bounds slice.
pub fn seek(i: Input, offset: u32) -> Result<()> {
    let offset = offset as usize;
    if offset > i.len() {
        return Err(nom::Err::Error(VerboseError::from_error_kind(i, ErrorKind::Eof)));
    }
    Ok((&i[offset..], ()))
}

/// Render a nom error produced while parsing `data` as a single line, listing the parser contexts
/// from the outermost to the innermost along with the byte offset at which each one failed.
pub fn pretty_error_message(data: Input, err: nom::Err<VerboseError<Input>>) -> String {
    let e = match err {
        nom::Err::Incomplete(_) => return "unexpected end of data".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
    };

    e.errors
        .iter()
        .rev()
        .map(|(at, kind)| {
            let what = match kind {
                VerboseErrorKind::Context(ctx) => ctx.to_string(),
                VerboseErrorKind::Char(c) => format!("expected '{}'", c),
                VerboseErrorKind::Nom(kind) => format!("{:?}", kind),
            };
            match position_in(data, at) {
                Some(pos) => format!("{} at 0x{:x}", what, pos),
                None => what,
            }
        })
        .collect::<Vec<_>>()
        .join(" => ")
}

// Offset of `sub` within `data`, if `sub` really is a subslice of it.
fn position_in(data: Input, sub: Input) -> Option<usize> {
    let start = data.as_ptr() as usize;
    let at = sub.as_ptr() as usize;
    at.checked_sub(start).filter(|&pos| pos <= data.len())
}
