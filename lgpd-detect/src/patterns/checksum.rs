//! Check-digit validators for numeric identifiers.

fn digits_of(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Luhn mod-10 check over the digits of `text`, ignoring separators.
/// Accepts 13 to 19 digits (payment card lengths).
#[inline]
pub fn luhn_valid(text: &str) -> bool {
    let digits = digits_of(text);
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let mut sum = 0u32;
    for (i, &d) in digits.iter().rev().enumerate() {
        let mut val = d;
        if i % 2 == 1 {
            val *= 2;
            if val > 9 {
                val -= 9;
            }
        }
        sum += val;
    }
    sum % 10 == 0
}

/// CPF check digits (Brazilian individual taxpayer id).
///
/// Eleven digits; the last two are mod-11 checks over the first nine and
/// ten. Repeated-digit sequences pass the arithmetic but are never issued.
#[inline]
pub fn cpf_valid(text: &str) -> bool {
    let digits = digits_of(text);
    if digits.len() != 11 {
        return false;
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let weight_start = len as u32 + 1;
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, &d)| d * (weight_start - i as u32))
            .sum();
        let rem = sum % 11;
        if rem < 2 {
            0
        } else {
            11 - rem
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}
