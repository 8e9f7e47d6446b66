//! Groth16 proof checking over BN254 for snarkjs-formatted keys and proofs

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use serde::Deserialize;
use std::str::FromStr;
use zkauth_common::{Error, Result, ZkProof};

/// Zero-knowledge proof checker
pub trait ZkpVerifier: Send + Sync {
    /// Check `proof` against a raw verification key
    fn verify(&self, proof: &ZkProof, verification_key: &[u8]) -> Result<()>;
}

/// snarkjs `verification_key.json`
#[derive(Debug, Deserialize)]
struct SnarkJsVerificationKey {
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    curve: Option<String>,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

/// Groth16 checker backed by arkworks
#[derive(Debug, Default, Clone, Copy)]
pub struct Groth16Verifier;

fn fq(s: &str) -> Result<Fq> {
    Fq::from_str(s).map_err(|_| Error::InvalidProof(format!("invalid base field element: {}", s)))
}

fn fr(s: &str) -> Result<Fr> {
    Fr::from_str(s).map_err(|_| Error::InvalidProof(format!("invalid scalar field element: {}", s)))
}

/// Affine G1 point from `[x, y, "1"]`
fn g1(coords: &[String]) -> Result<G1Affine> {
    if coords.len() < 2 || coords.get(2).is_some_and(|z| z != "1") {
        return Err(Error::InvalidProof(format!("malformed G1 point: {:?}", coords)));
    }

    let point = G1Affine::new_unchecked(fq(&coords[0])?, fq(&coords[1])?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(Error::InvalidProof("G1 point not on curve".to_string()));
    }
    Ok(point)
}

/// Affine G2 point from `[[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]`
fn g2(coords: &[Vec<String>]) -> Result<G2Affine> {
    let malformed = || Error::InvalidProof(format!("malformed G2 point: {:?}", coords));
    if coords.len() < 2 || coords[..2].iter().any(|c| c.len() != 2) {
        return Err(malformed());
    }
    if let Some(z) = coords.get(2) {
        if z.len() != 2 || z[0] != "1" || z[1] != "0" {
            return Err(malformed());
        }
    }

    let x = Fq2::new(fq(&coords[0][0])?, fq(&coords[0][1])?);
    let y = Fq2::new(fq(&coords[1][0])?, fq(&coords[1][1])?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(Error::InvalidProof("G2 point not on curve".to_string()));
    }
    Ok(point)
}

fn verifying_key(raw: &[u8]) -> Result<VerifyingKey<Bn254>> {
    let key: SnarkJsVerificationKey = serde_json::from_slice(raw)
        .map_err(|e| Error::InvalidProof(format!("malformed verification key: {}", e)))?;

    if key.protocol.as_deref().is_some_and(|p| p != "groth16") {
        return Err(Error::InvalidProof(format!("unsupported protocol: {:?}", key.protocol)));
    }
    if key.curve.as_deref().is_some_and(|c| c != "bn128") {
        return Err(Error::InvalidProof(format!("unsupported curve: {:?}", key.curve)));
    }

    Ok(VerifyingKey {
        alpha_g1: g1(&key.vk_alpha_1)?,
        beta_g2: g2(&key.vk_beta_2)?,
        gamma_g2: g2(&key.vk_gamma_2)?,
        delta_g2: g2(&key.vk_delta_2)?,
        gamma_abc_g1: key.ic.iter().map(|p| g1(p)).collect::<Result<_>>()?,
    })
}

impl ZkpVerifier for Groth16Verifier {
    fn verify(&self, zk_proof: &ZkProof, verification_key: &[u8]) -> Result<()> {
        if zk_proof.proof.protocol != "groth16" {
            return Err(Error::InvalidProof(format!(
                "unsupported protocol: {}",
                zk_proof.proof.protocol
            )));
        }

        let vk = verifying_key(verification_key)?;
        if vk.gamma_abc_g1.len() != zk_proof.pub_signals.len() + 1 {
            return Err(Error::InvalidProof(format!(
                "verification key expects {} public signals, proof has {}",
                vk.gamma_abc_g1.len().saturating_sub(1),
                zk_proof.pub_signals.len()
            )));
        }

        let proof = Proof::<Bn254> {
            a: g1(&zk_proof.proof.pi_a)?,
            b: g2(&zk_proof.proof.pi_b)?,
            c: g1(&zk_proof.proof.pi_c)?,
        };
        let inputs = zk_proof
            .pub_signals
            .iter()
            .map(|s| fr(s))
            .collect::<Result<Vec<_>>>()?;

        let pvk = PreparedVerifyingKey::from(vk);
        let valid = Groth16::<Bn254>::verify_proof(&pvk, &proof, &inputs)
            .map_err(|e| Error::InvalidProof(e.to_string()))?;

        if !valid {
            return Err(Error::InvalidProof("groth16 pairing check failed".to_string()));
        }
        Ok(())
    }
}
